//! Footer arrangements.

use super::{Align, Context, Node, SectionKind, Text};
use crate::config::Rgb;
use crate::document::FooterDesign;

const FOOTER_PT: f32 = 8.0;

pub(super) fn layout(ctx: &Context<'_>) -> Node {
    let align = Align::from(ctx.template.footer_position);
    let children = match ctx.template.footer_design {
        FooterDesign::Simple => simple(ctx, align),
        FooterDesign::Detailed => detailed(ctx, align),
        FooterDesign::Minimal => minimal(ctx, align),
    };
    Node::section(SectionKind::Footer, children)
}

fn line(content: impl Into<String>, color: Rgb, align: Align) -> Node {
    Node::Text(Text::new(content, FOOTER_PT, color).aligned(align))
}

/// Divider and a thank-you line
fn simple(ctx: &Context<'_>, align: Align) -> Vec<Node> {
    let mut nodes = vec![
        Node::Rule {
            color: ctx.secondary(),
            thickness_pt: 0.5,
        },
        Node::Spacer { height_mm: 2.0 },
        line("Thank you for your business!", ctx.secondary(), align),
    ];
    if let Some(generated) = ctx.generated_on() {
        nodes.push(line(generated, ctx.secondary(), align));
    }
    nodes
}

/// Terms on one side, signatory block on the other
fn detailed(ctx: &Context<'_>, align: Align) -> Vec<Node> {
    let company = ctx.template.company_profile.name.trim();
    let signatory = if company.is_empty() {
        "For the supplier".to_string()
    } else {
        format!("For {company}")
    };

    let terms = vec![
        Node::Text(Text::new("Terms & Conditions", FOOTER_PT, ctx.primary()).bold()),
        line("Goods once sold will not be taken back.", ctx.secondary(), Align::Left),
        line("Subject to local jurisdiction.", ctx.secondary(), Align::Left),
    ];
    let sign = vec![
        Node::Text(
            Text::new(signatory, FOOTER_PT + 1.0, ctx.primary())
                .bold()
                .aligned(Align::Right),
        ),
        Node::Spacer { height_mm: 10.0 },
        line("Authorised Signatory", ctx.secondary(), Align::Right),
    ];

    // A right-positioned footer mirrors the two columns
    let columns = if align == Align::Right {
        [(1.0, sign), (1.0, terms)]
    } else {
        [(1.0, terms), (1.0, sign)]
    };

    let mut nodes = vec![
        Node::Rule {
            color: ctx.primary(),
            thickness_pt: 1.0,
        },
        Node::Spacer { height_mm: 2.0 },
        Node::row(columns),
    ];
    if let Some(generated) = ctx.generated_on() {
        nodes.push(Node::Spacer { height_mm: 2.0 });
        nodes.push(line(generated, ctx.secondary(), align));
    }
    nodes
}

/// A single small line: company, invoice number, date
fn minimal(ctx: &Context<'_>, align: Align) -> Vec<Node> {
    let mut parts = Vec::new();
    let company = ctx.template.company_profile.name.trim();
    if !company.is_empty() {
        parts.push(company.to_string());
    }
    parts.push(ctx.invoice.invoice_number().to_string());

    let mut nodes = vec![line(parts.join(" | "), ctx.secondary(), align)];
    if let Some(generated) = ctx.generated_on() {
        nodes.push(line(generated, ctx.secondary(), align));
    }
    nodes
}

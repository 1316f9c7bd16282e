//! Header arrangements. Each position is its own layout, not a style flag.

use super::{Align, Context, Node, SectionKind, Text};
use crate::config::Rgb;
use crate::document::Position;

const COMPANY_PT: f32 = 16.0;
const ADDRESS_PT: f32 = 8.5;
const TITLE_PT: f32 = 18.0;

pub(super) fn layout(ctx: &Context<'_>) -> Node {
    let children = match ctx.template.header_position {
        Position::Left => left(ctx),
        Position::Center => center(ctx),
        Position::Right => right(ctx),
    };
    Node::section(SectionKind::Header, children)
}

/// Company name and address, aligned as a block
fn company_block(ctx: &Context<'_>, align: Align, name_pt: f32) -> Vec<Node> {
    let profile = &ctx.template.company_profile;
    let mut nodes = Vec::new();

    if let Some(logo) = ctx.logo(align) {
        nodes.push(logo);
    }
    if !profile.name.trim().is_empty() {
        nodes.push(Node::Text(
            Text::new(profile.name.trim(), name_pt, ctx.primary())
                .bold()
                .aligned(align),
        ));
    }
    for line in profile.address.lines().map(str::trim).filter(|l| !l.is_empty()) {
        nodes.push(Node::Text(
            Text::new(line, ADDRESS_PT, ctx.secondary()).aligned(align),
        ));
    }
    nodes
}

fn title(ctx: &Context<'_>, align: Align, size_pt: f32) -> Node {
    Node::Text(
        Text::new(ctx.title.clone(), size_pt, ctx.primary())
            .bold()
            .aligned(align),
    )
}

/// Company block on the left, document title on the right
fn left(ctx: &Context<'_>) -> Vec<Node> {
    vec![Node::row([
        (2.0, company_block(ctx, Align::Left, COMPANY_PT)),
        (1.0, vec![title(ctx, Align::Right, TITLE_PT)]),
    ])]
}

/// Everything stacked and centred, title under a thin divider
fn center(ctx: &Context<'_>) -> Vec<Node> {
    let mut nodes = company_block(ctx, Align::Center, COMPANY_PT + 2.0);
    nodes.push(Node::Spacer { height_mm: 2.0 });
    nodes.push(Node::Rule {
        color: Rgb::light_gray(),
        thickness_pt: 0.5,
    });
    nodes.push(Node::Spacer { height_mm: 2.0 });
    nodes.push(title(ctx, Align::Center, TITLE_PT - 4.0));
    nodes
}

/// Document title on the left, company block on the right
fn right(ctx: &Context<'_>) -> Vec<Node> {
    vec![Node::row([
        (1.0, vec![title(ctx, Align::Left, TITLE_PT)]),
        (2.0, company_block(ctx, Align::Right, COMPANY_PT)),
    ])]
}

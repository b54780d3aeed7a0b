//! Default Resolution - Leaf, Then Template, Then Built-in
//!
//! An absent leaf-level field means "inherit", never "use a literal". Each
//! resolved value remembers which level supplied it.

use serde::{Deserialize, Serialize};

use crate::templates::{
    AlignH, AlignV, DataMatrixElement, Dither, Element, ImageElement, ImageFit, LeafNode,
    MissingVariables, PaddingMm, QrElement, RenderMode, SizeMode, TemplateDefaults, TextElement,
    TextFit, TextWrap,
};

/// Which level a resolved value came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Authority {
    /// Built-in fallback
    #[default]
    Builtin,
    /// Template `defaults` block
    Template,
    /// Set on the leaf or element itself
    Leaf,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Resolved<T> {
    pub value: T,
    pub authority: Authority,
}

pub fn resolve<T>(leaf: Option<T>, template: Option<T>, builtin: T) -> Resolved<T> {
    match (leaf, template) {
        (Some(value), _) => Resolved { value, authority: Authority::Leaf },
        (None, Some(value)) => Resolved { value, authority: Authority::Template },
        (None, None) => Resolved { value: builtin, authority: Authority::Builtin },
    }
}

/// Built-in fallbacks, used when neither the leaf nor the template says anything.
pub mod builtin {
    use super::*;

    pub const LEAF_PADDING_MM: PaddingMm = [0.0; 4];

    pub const FONT_HEIGHT_MM: f64 = 4.0;
    pub const TEXT_WRAP: TextWrap = TextWrap::Word;
    pub const TEXT_FIT: TextFit = TextFit::ShrinkToFit;
    pub const MAX_LINES: u32 = 1;
    pub const TEXT_ALIGN_H: AlignH = AlignH::Left;
    pub const TEXT_ALIGN_V: AlignV = AlignV::Top;

    pub const QUIET_ZONE_MM: f64 = 1.0;
    pub const SIZE_MODE: SizeMode = SizeMode::Fixed;
    pub const CODE_ALIGN_H: AlignH = AlignH::Center;
    pub const CODE_ALIGN_V: AlignV = AlignV::Center;
    pub const RENDER_MODE: RenderMode = RenderMode::Zpl;

    pub const IMAGE_FIT: ImageFit = ImageFit::Contain;
    pub const IMAGE_ALIGN_H: AlignH = AlignH::Center;
    pub const IMAGE_ALIGN_V: AlignV = AlignV::Center;
    pub const INPUT_DPI: u32 = 203;
    pub const THRESHOLD: u8 = 128;
    pub const DITHER: Dither = Dither::None;

    pub const MISSING_VARIABLES: MissingVariables = MissingVariables::Error;
    pub const EMIT_CI28: bool = true;
}

pub fn resolve_leaf_padding(
    leaf: &LeafNode,
    defaults: Option<&TemplateDefaults>,
) -> Resolved<PaddingMm> {
    resolve(
        leaf.padding_mm,
        defaults.and_then(|d| d.leaf_padding_mm),
        builtin::LEAF_PADDING_MM,
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedText {
    pub font_height_mm: Resolved<f64>,
    /// No built-in width: renderers derive it from the height.
    pub font_width_mm: Option<Resolved<f64>>,
    pub wrap: Resolved<TextWrap>,
    pub fit: Resolved<TextFit>,
    pub max_lines: Resolved<u32>,
    pub align_h: Resolved<AlignH>,
    pub align_v: Resolved<AlignV>,
}

pub fn resolve_text(el: &TextElement, defaults: Option<&TemplateDefaults>) -> ResolvedText {
    let d = defaults.and_then(|d| d.text.clone()).unwrap_or_default();
    let font_width_mm = match (el.font_width_mm, d.font_width_mm) {
        (None, None) => None,
        (leaf, template) => Some(resolve(leaf, template, 0.0)),
    };
    ResolvedText {
        font_height_mm: resolve(el.font_height_mm, d.font_height_mm, builtin::FONT_HEIGHT_MM),
        font_width_mm,
        wrap: resolve(el.wrap, d.wrap, builtin::TEXT_WRAP),
        fit: resolve(el.fit, d.fit, builtin::TEXT_FIT),
        max_lines: resolve(el.max_lines, d.max_lines, builtin::MAX_LINES),
        align_h: resolve(el.align_h, d.align_h, builtin::TEXT_ALIGN_H),
        align_v: resolve(el.align_v, d.align_v, builtin::TEXT_ALIGN_V),
    }
}

/// Placement shared by QR and Data Matrix codes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedCode2d {
    pub quiet_zone_mm: Resolved<f64>,
    pub size_mode: Resolved<SizeMode>,
    pub align_h: Resolved<AlignH>,
    pub align_v: Resolved<AlignV>,
    pub render_mode: Resolved<RenderMode>,
}

struct Code2dFields {
    quiet_zone_mm: Option<f64>,
    size_mode: Option<SizeMode>,
    align_h: Option<AlignH>,
    align_v: Option<AlignV>,
    render_mode: Option<RenderMode>,
}

fn resolve_code2d(el: Code2dFields, defaults: Option<&TemplateDefaults>) -> ResolvedCode2d {
    let d = defaults.and_then(|d| d.code2d.clone()).unwrap_or_default();
    ResolvedCode2d {
        quiet_zone_mm: resolve(el.quiet_zone_mm, d.quiet_zone_mm, builtin::QUIET_ZONE_MM),
        size_mode: resolve(el.size_mode, d.size_mode, builtin::SIZE_MODE),
        align_h: resolve(el.align_h, d.align_h, builtin::CODE_ALIGN_H),
        align_v: resolve(el.align_v, d.align_v, builtin::CODE_ALIGN_V),
        render_mode: resolve(el.render_mode, d.render_mode, builtin::RENDER_MODE),
    }
}

pub fn resolve_qr(el: &QrElement, defaults: Option<&TemplateDefaults>) -> ResolvedCode2d {
    resolve_code2d(
        Code2dFields {
            quiet_zone_mm: el.quiet_zone_mm,
            size_mode: el.size_mode,
            align_h: el.align_h,
            align_v: el.align_v,
            render_mode: el.render_mode,
        },
        defaults,
    )
}

pub fn resolve_datamatrix(
    el: &DataMatrixElement,
    defaults: Option<&TemplateDefaults>,
) -> ResolvedCode2d {
    resolve_code2d(
        Code2dFields {
            quiet_zone_mm: el.quiet_zone_mm,
            size_mode: el.size_mode,
            align_h: el.align_h,
            align_v: el.align_v,
            render_mode: el.render_mode,
        },
        defaults,
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedImage {
    pub fit: Resolved<ImageFit>,
    pub align_h: Resolved<AlignH>,
    pub align_v: Resolved<AlignV>,
    pub input_dpi: Resolved<u32>,
    pub threshold: Resolved<u8>,
    pub dither: Resolved<Dither>,
    pub invert: Resolved<bool>,
}

pub fn resolve_image(el: &ImageElement, defaults: Option<&TemplateDefaults>) -> ResolvedImage {
    let d = defaults.and_then(|d| d.image.clone()).unwrap_or_default();
    ResolvedImage {
        fit: resolve(el.fit, d.fit, builtin::IMAGE_FIT),
        align_h: resolve(el.align_h, d.align_h, builtin::IMAGE_ALIGN_H),
        align_v: resolve(el.align_v, d.align_v, builtin::IMAGE_ALIGN_V),
        input_dpi: resolve(el.input_dpi, d.input_dpi, builtin::INPUT_DPI),
        threshold: resolve(el.threshold, d.threshold, builtin::THRESHOLD),
        dither: resolve(el.dither, d.dither, builtin::DITHER),
        invert: resolve(el.invert, d.invert, false),
    }
}

/// Render behaviour has no leaf level; only template and built-in apply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedRender {
    pub missing_variables: Resolved<MissingVariables>,
    pub emit_ci28: Resolved<bool>,
    pub debug_padding_guides: Resolved<bool>,
    pub debug_gutter_guides: Resolved<bool>,
}

pub fn resolve_render(defaults: Option<&TemplateDefaults>) -> ResolvedRender {
    let d = defaults.and_then(|d| d.render.clone()).unwrap_or_default();
    ResolvedRender {
        missing_variables: resolve(None, d.missing_variables, builtin::MISSING_VARIABLES),
        emit_ci28: resolve(None, d.emit_ci28, builtin::EMIT_CI28),
        debug_padding_guides: resolve(None, d.debug_padding_guides, false),
        debug_gutter_guides: resolve(None, d.debug_gutter_guides, false),
    }
}

/// Effective placement properties of any element kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ResolvedElement {
    Text(ResolvedText),
    Qr(ResolvedCode2d),
    Datamatrix(ResolvedCode2d),
    Image(ResolvedImage),
    Line,
}

pub fn resolve_element(element: &Element, defaults: Option<&TemplateDefaults>) -> ResolvedElement {
    match element {
        Element::Text(el) => ResolvedElement::Text(resolve_text(el, defaults)),
        Element::Qr(el) => ResolvedElement::Qr(resolve_qr(el, defaults)),
        Element::Datamatrix(el) => ResolvedElement::Datamatrix(resolve_datamatrix(el, defaults)),
        Element::Image(el) => ResolvedElement::Image(resolve_image(el, defaults)),
        Element::Line(_) => ResolvedElement::Line,
    }
}

//! Template Document - The Split-Tree Contract
//!
//! A label is a recursive binary partition of a rectangle. Every node is
//! either a split with exactly two children or a leaf holding exactly one
//! element. Both invariants are carried by the types (`[Arc<Node>; 2]`,
//! `[Element; 1]`); everything else is checked by `schema` and `validation`.

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

pub const SCHEMA_VERSION: u32 = 1;
pub const DEFAULT_DIVIDER_THICKNESS_MM: f64 = 0.3;

/// `[top, right, bottom, left]` in millimetres.
pub type PaddingMm = [f64; 4];

pub type Extensions = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateDoc {
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<TemplateDefaults>,
    pub layout: Arc<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Extensions>,
}

impl TemplateDoc {
    pub fn from_layout(layout: Node) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            name: None,
            defaults: None,
            layout: Arc::new(layout),
            extensions: None,
        }
    }

    /// The document handed out by "new": one blank text leaf aliased `root`
    /// and a full set of template defaults.
    pub fn new_default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            name: Some("New template".to_string()),
            defaults: Some(TemplateDefaults {
                leaf_padding_mm: Some([0.375; 4]),
                text: Some(TextDefaults {
                    font_height_mm: Some(4.0),
                    font_width_mm: None,
                    wrap: Some(TextWrap::Word),
                    fit: Some(TextFit::ShrinkToFit),
                    max_lines: Some(1),
                    align_h: Some(AlignH::Left),
                    align_v: Some(AlignV::Top),
                }),
                code2d: Some(Code2dDefaults {
                    quiet_zone_mm: Some(1.0),
                    render_mode: Some(RenderMode::Zpl),
                    ..Default::default()
                }),
                image: Some(ImageDefaults {
                    fit: Some(ImageFit::Contain),
                    align_h: Some(AlignH::Center),
                    align_v: Some(AlignV::Center),
                    input_dpi: Some(203),
                    threshold: Some(128),
                    dither: Some(Dither::None),
                    invert: Some(false),
                }),
                render: Some(RenderDefaults {
                    missing_variables: Some(MissingVariables::Error),
                    emit_ci28: Some(true),
                    ..Default::default()
                }),
            }),
            layout: Arc::new(Node::Leaf(LeafNode {
                alias: Some("root".to_string()),
                debug_border: Some(false),
                ..LeafNode::new(Element::Text(TextElement::new("")))
            })),
            extensions: None,
        }
    }

    pub fn text_defaults(&self) -> Option<&TextDefaults> {
        self.defaults.as_ref().and_then(|d| d.text.as_ref())
    }
}

// --- Template defaults ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaf_padding_mm: Option<PaddingMm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextDefaults>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code2d: Option<Code2dDefaults>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageDefaults>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render: Option<RenderDefaults>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_height_mm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_width_mm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrap: Option<TextWrap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit: Option<TextFit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_lines: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align_h: Option<AlignH>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align_v: Option<AlignV>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Code2dDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiet_zone_mm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_mode: Option<SizeMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align_h: Option<AlignH>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align_v: Option<AlignV>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_mode: Option<RenderMode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit: Option<ImageFit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align_h: Option<AlignH>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align_v: Option<AlignV>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_dpi: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dither: Option<Dither>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invert: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_variables: Option<MissingVariables>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emit_ci28: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_padding_guides: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_gutter_guides: Option<bool>,
}

// --- Nodes ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Children side by side; the split axis is x.
    #[serde(rename = "v")]
    Vertical,
    /// Children stacked; the split axis is y.
    #[serde(rename = "h")]
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Split,
    Leaf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Node {
    Split(SplitNode),
    Leaf(LeafNode),
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Split(_) => NodeKind::Split,
            Node::Leaf(_) => NodeKind::Leaf,
        }
    }

    pub fn alias(&self) -> Option<&str> {
        match self {
            Node::Split(s) => s.alias.as_deref(),
            Node::Leaf(l) => l.alias.as_deref(),
        }
    }

    pub fn as_leaf(&self) -> Option<&LeafNode> {
        match self {
            Node::Leaf(l) => Some(l),
            Node::Split(_) => None,
        }
    }

    pub fn as_split(&self) -> Option<&SplitNode> {
        match self {
            Node::Split(s) => Some(s),
            Node::Leaf(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Divider {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thickness_mm: Option<f64>,
}

impl Divider {
    pub fn is_visible(&self) -> bool {
        self.visible.unwrap_or(false)
    }

    pub fn thickness(&self) -> f64 {
        self.thickness_mm.unwrap_or(DEFAULT_DIVIDER_THICKNESS_MM)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub direction: Direction,
    /// Share of the space left after the gutter given to the first child.
    pub ratio: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gutter_mm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub divider: Option<Divider>,
    pub children: [Arc<Node>; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Extensions>,
}

impl SplitNode {
    pub fn gutter(&self) -> f64 {
        self.gutter_mm.unwrap_or(0.0)
    }

    pub fn divider_visible(&self) -> bool {
        self.divider.as_ref().is_some_and(Divider::is_visible)
    }

    pub fn divider_thickness(&self) -> f64 {
        self.divider
            .as_ref()
            .map_or(DEFAULT_DIVIDER_THICKNESS_MM, Divider::thickness)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding_mm: Option<PaddingMm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_border: Option<bool>,
    pub elements: [Element; 1],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Extensions>,
}

impl LeafNode {
    pub fn new(element: Element) -> Self {
        Self {
            alias: None,
            padding_mm: None,
            debug_border: None,
            elements: [element],
            extensions: None,
        }
    }

    pub fn element(&self) -> &Element {
        &self.elements[0]
    }
}

// --- Elements ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Text,
    Qr,
    Datamatrix,
    Image,
    Line,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Element {
    Text(TextElement),
    Qr(QrElement),
    Datamatrix(DataMatrixElement),
    Image(ImageElement),
    Line(LineElement),
}

impl Element {
    pub fn kind(&self) -> ElementKind {
        match self {
            Element::Text(_) => ElementKind::Text,
            Element::Qr(_) => ElementKind::Qr,
            Element::Datamatrix(_) => ElementKind::Datamatrix,
            Element::Image(_) => ElementKind::Image,
            Element::Line(_) => ElementKind::Line,
        }
    }

    pub fn base(&self) -> &ElementBase {
        match self {
            Element::Text(e) => &e.base,
            Element::Qr(e) => &e.base,
            Element::Datamatrix(e) => &e.base,
            Element::Image(e) => &e.base,
            Element::Line(e) => &e.base,
        }
    }

    /// Text carrying placeholders: text content, or the QR / Data Matrix payload.
    pub fn template_text(&self) -> Option<&str> {
        match self {
            Element::Text(e) => Some(&e.text),
            Element::Qr(e) => Some(&e.data),
            Element::Datamatrix(e) => Some(&e.data),
            Element::Image(_) | Element::Line(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementBase {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding_mm: Option<PaddingMm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_size_mm: Option<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size_mm: Option<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Extensions>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextElement {
    #[serde(flatten)]
    pub base: ElementBase,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_height_mm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_width_mm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrap: Option<TextWrap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit: Option<TextFit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_lines: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align_h: Option<AlignH>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align_v: Option<AlignV>,
}

impl TextElement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QrElement {
    #[serde(flatten)]
    pub base: ElementBase,
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnification: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_mode: Option<SizeMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_mode: Option<RenderMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align_h: Option<AlignH>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align_v: Option<AlignV>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_correction: Option<ErrorCorrection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_mode: Option<QrInputMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_mode: Option<QrCharacterMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiet_zone_mm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<QrTheme>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QrTheme {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<QrThemePreset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_shape: Option<ModuleShape>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finder_shape: Option<ModuleShape>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataMatrixElement {
    #[serde(flatten)]
    pub base: ElementBase,
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_size_mm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_mode: Option<SizeMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_mode: Option<RenderMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align_h: Option<AlignH>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align_v: Option<AlignV>,
    /// Only 200 (ECC 200) is accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_id: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escape_char: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiet_zone_mm: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageElement {
    #[serde(flatten)]
    pub base: ElementBase,
    pub source: ImageSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit: Option<ImageFit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align_h: Option<AlignH>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align_v: Option<AlignV>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_dpi: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dither: Option<Dither>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invert: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSourceKind {
    Base64,
    Url,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSource {
    pub kind: ImageSourceKind,
    pub data: String,
}

impl ImageSource {
    /// Inline bytes as standard base64.
    pub fn embed(bytes: &[u8]) -> Self {
        Self {
            kind: ImageSourceKind::Base64,
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    /// Inline payload from a `data:<mime>;base64,<payload>` URL. Anything
    /// else is kept as a URL reference.
    pub fn from_data_url(url: &str) -> Self {
        match url
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(";base64,"))
        {
            Some((_, payload)) => Self {
                kind: ImageSourceKind::Base64,
                data: payload.to_string(),
            },
            None => Self {
                kind: ImageSourceKind::Url,
                data: url.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineElement {
    #[serde(flatten)]
    pub base: ElementBase,
    pub orientation: LineOrientation,
    pub thickness_mm: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<LineAlign>,
}

// --- Wire enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextWrap {
    None,
    Word,
    Char,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextFit {
    Overflow,
    Wrap,
    ShrinkToFit,
    Truncate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignH {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignV {
    Top,
    Center,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeMode {
    Fixed,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    Zpl,
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCorrection {
    L,
    M,
    Q,
    H,
}

/// `A` automatic, `M` manual (requires a character mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QrInputMode {
    A,
    M,
}

/// `N` numeric, `A` alphanumeric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QrCharacterMode {
    N,
    A,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QrThemePreset {
    Classic,
    Dots,
    Rounded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleShape {
    Square,
    Circle,
    Rounded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFit {
    None,
    Contain,
    Cover,
    Stretch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dither {
    None,
    FloydSteinberg,
    Bayer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineOrientation {
    #[serde(rename = "h")]
    Horizontal,
    #[serde(rename = "v")]
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineAlign {
    Start,
    Center,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingVariables {
    Error,
    Empty,
}

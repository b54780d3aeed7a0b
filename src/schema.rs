//! Shape Checking - Structure, Types and Ranges
//!
//! Walks the raw JSON value and reports every malformed field with its path
//! before anything is deserialized. Unknown keys are ignored; `null` is never
//! accepted in place of an absent optional field.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::templates::{
    AlignH, AlignV, Direction, Dither, ErrorCorrection, ImageFit, ImageSourceKind, LineAlign,
    LineOrientation, MissingVariables, ModuleShape, QrCharacterMode, QrInputMode, QrThemePreset,
    RenderMode, SizeMode, TextFit, TextWrap, SCHEMA_VERSION,
};
use crate::validation::{IssuePath, ValidationIssue};

const RULE: &str = "shape";
const UNKNOWN_ELEMENT_TYPE: &str =
    "Invalid discriminator value. Expected 'text' | 'qr' | 'datamatrix' | 'image' | 'line'";

#[derive(Debug, Clone, Copy)]
enum Bound {
    NonNegative,
    Positive,
    /// Strictly between 0 and 1.
    OpenUnit,
}

/// Collect every shape issue in `value`. Empty means it deserializes as a `TemplateDoc`.
pub fn check_shape(value: &Value) -> Vec<ValidationIssue> {
    let mut shape = Shape::default();
    shape.document(value, &IssuePath::root());
    shape.issues
}

/// Rewrite integral floats (`3.0`) as integers so integer fields deserialize.
///
/// `extensions` maps are opaque and come back untouched.
pub fn normalize_integers(value: Value) -> Value {
    match value {
        Value::Number(n) if !n.is_i64() && !n.is_u64() => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
                Value::from(f as i64)
            }
            _ => Value::Number(n),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_integers).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| {
                    let v = if k == "extensions" { v } else { normalize_integers(v) };
                    (k, v)
                })
                .collect(),
        ),
        other => other,
    }
}

#[derive(Default)]
struct Shape {
    issues: Vec<ValidationIssue>,
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl Shape {
    fn fail(&mut self, path: &IssuePath, message: impl Into<String>) {
        self.issues.push(ValidationIssue::new(RULE, path.clone(), message));
    }

    fn object<'v>(&mut self, value: &'v Value, path: &IssuePath) -> Option<&'v Map<String, Value>> {
        match value {
            Value::Object(obj) => Some(obj),
            other => {
                self.fail(path, format!("Expected object, received {}", type_name(other)));
                None
            }
        }
    }

    fn field<'v>(
        &mut self,
        obj: &'v Map<String, Value>,
        key: &str,
        path: &IssuePath,
        required: bool,
    ) -> Option<&'v Value> {
        let value = obj.get(key);
        if value.is_none() && required {
            self.fail(&path.key(key), "Required");
        }
        value
    }

    fn number(
        &mut self,
        obj: &Map<String, Value>,
        key: &str,
        path: &IssuePath,
        bound: Bound,
        required: bool,
    ) {
        let Some(value) = self.field(obj, key, path, required) else {
            return;
        };
        let path = path.key(key);
        let Some(n) = value.as_f64() else {
            self.fail(&path, format!("Expected number, received {}", type_name(value)));
            return;
        };
        let message = match bound {
            Bound::NonNegative if n < 0.0 => "Number must be greater than or equal to 0",
            Bound::Positive if n <= 0.0 => "Number must be greater than 0",
            Bound::OpenUnit if n <= 0.0 => "Number must be greater than 0",
            Bound::OpenUnit if n >= 1.0 => "Number must be less than 1",
            _ => return,
        };
        self.fail(&path, message);
    }

    fn integer(
        &mut self,
        obj: &Map<String, Value>,
        key: &str,
        path: &IssuePath,
        min: i64,
        max: i64,
        required: bool,
    ) {
        let Some(value) = self.field(obj, key, path, required) else {
            return;
        };
        let path = path.key(key);
        let n = match value {
            Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => i,
                (None, _) if n.is_u64() => i64::MAX,
                // `3.0` is an integer; saturates outside the i64 range
                (None, Some(f)) if f.is_finite() && f.fract() == 0.0 => f as i64,
                (None, _) => {
                    self.fail(&path, "Expected integer, received float");
                    return;
                }
            },
            other => {
                self.fail(&path, format!("Expected integer, received {}", type_name(other)));
                return;
            }
        };
        if min == max && n != min {
            self.fail(&path, format!("Invalid literal value, expected {min}"));
        } else if n < min {
            self.fail(&path, format!("Number must be greater than or equal to {min}"));
        } else if n > max {
            self.fail(&path, format!("Number must be less than or equal to {max}"));
        }
    }

    fn string(
        &mut self,
        obj: &Map<String, Value>,
        key: &str,
        path: &IssuePath,
        min_len: usize,
        required: bool,
    ) {
        let Some(value) = self.field(obj, key, path, required) else {
            return;
        };
        match value {
            Value::String(s) if s.chars().count() < min_len => self.fail(
                &path.key(key),
                format!("String must contain at least {min_len} character(s)"),
            ),
            Value::String(_) => {}
            other => {
                let message = format!("Expected string, received {}", type_name(other));
                self.fail(&path.key(key), message);
            }
        }
    }

    fn boolean(&mut self, obj: &Map<String, Value>, key: &str, path: &IssuePath) {
        if let Some(value) = self.field(obj, key, path, false) {
            if !value.is_boolean() {
                let message = format!("Expected boolean, received {}", type_name(value));
                self.fail(&path.key(key), message);
            }
        }
    }

    /// Enum literal check, delegated to the wire type's own deserializer.
    fn literal<T: DeserializeOwned>(
        &mut self,
        obj: &Map<String, Value>,
        key: &str,
        path: &IssuePath,
        required: bool,
    ) {
        if let Some(value) = self.field(obj, key, path, required) {
            if let Err(err) = serde_json::from_value::<T>(value.clone()) {
                self.fail(&path.key(key), err.to_string());
            }
        }
    }

    fn tuple<'v>(
        &mut self,
        value: &'v Value,
        path: &IssuePath,
        len: usize,
    ) -> Option<&'v Vec<Value>> {
        match value {
            Value::Array(items) if items.len() == len => Some(items),
            Value::Array(items) => {
                let received = items.len();
                self.fail(
                    path,
                    format!("Expected array of length {len}, received length {received}"),
                );
                None
            }
            other => {
                self.fail(path, format!("Expected array, received {}", type_name(other)));
                None
            }
        }
    }

    fn mm_tuple(&mut self, obj: &Map<String, Value>, key: &str, path: &IssuePath, len: usize) {
        let Some(value) = obj.get(key) else {
            return;
        };
        let path = path.key(key);
        let Some(items) = self.tuple(value, &path, len) else {
            return;
        };
        for (i, item) in items.iter().enumerate() {
            let path = path.key(i);
            match item.as_f64() {
                Some(n) if n < 0.0 => self.fail(&path, "Number must be greater than or equal to 0"),
                Some(_) => {}
                None => self.fail(&path, format!("Expected number, received {}", type_name(item))),
            }
        }
    }

    fn extensions(&mut self, obj: &Map<String, Value>, path: &IssuePath) {
        if let Some(value) = obj.get("extensions") {
            self.object(value, &path.key("extensions"));
        }
    }

    fn align(&mut self, obj: &Map<String, Value>, path: &IssuePath) {
        self.literal::<AlignH>(obj, "align_h", path, false);
        self.literal::<AlignV>(obj, "align_v", path, false);
    }

    // --- Document ---

    fn document(&mut self, value: &Value, path: &IssuePath) {
        let Some(obj) = self.object(value, path) else {
            return;
        };
        let version = i64::from(SCHEMA_VERSION);
        self.integer(obj, "schema_version", path, version, version, true);
        self.string(obj, "name", path, 1, false);
        if let Some(defaults) = obj.get("defaults") {
            self.defaults(defaults, &path.key("defaults"));
        }
        if let Some(layout) = self.field(obj, "layout", path, true) {
            self.node(layout, &path.key("layout"));
        }
        self.extensions(obj, path);
    }

    fn defaults(&mut self, value: &Value, path: &IssuePath) {
        let Some(obj) = self.object(value, path) else {
            return;
        };
        self.mm_tuple(obj, "leaf_padding_mm", path, 4);

        if let Some(text) = obj.get("text") {
            let path = path.key("text");
            if let Some(text) = self.object(text, &path) {
                self.text_fields(text, &path);
            }
        }
        if let Some(code2d) = obj.get("code2d") {
            let path = path.key("code2d");
            if let Some(code2d) = self.object(code2d, &path) {
                self.number(code2d, "quiet_zone_mm", &path, Bound::NonNegative, false);
                self.literal::<SizeMode>(code2d, "size_mode", &path, false);
                self.align(code2d, &path);
                self.literal::<RenderMode>(code2d, "render_mode", &path, false);
            }
        }
        if let Some(image) = obj.get("image") {
            let path = path.key("image");
            if let Some(image) = self.object(image, &path) {
                self.image_fields(image, &path);
            }
        }
        if let Some(render) = obj.get("render") {
            let path = path.key("render");
            if let Some(render) = self.object(render, &path) {
                self.literal::<MissingVariables>(render, "missing_variables", &path, false);
                self.boolean(render, "emit_ci28", &path);
                self.boolean(render, "debug_padding_guides", &path);
                self.boolean(render, "debug_gutter_guides", &path);
            }
        }
    }

    // --- Nodes ---

    fn node(&mut self, value: &Value, path: &IssuePath) {
        let Some(obj) = self.object(value, path) else {
            return;
        };
        match obj.get("kind").and_then(Value::as_str) {
            Some("split") => self.split(obj, path),
            Some("leaf") => self.leaf(obj, path),
            _ => self.fail(&path.key("kind"), "Expected \"split\" or \"leaf\""),
        }
    }

    fn split(&mut self, obj: &Map<String, Value>, path: &IssuePath) {
        self.string(obj, "alias", path, 1, false);
        self.literal::<Direction>(obj, "direction", path, true);
        self.number(obj, "ratio", path, Bound::OpenUnit, true);
        self.number(obj, "gutter_mm", path, Bound::NonNegative, false);
        if let Some(divider) = obj.get("divider") {
            let path = path.key("divider");
            if let Some(divider) = self.object(divider, &path) {
                self.boolean(divider, "visible", &path);
                self.number(divider, "thickness_mm", &path, Bound::Positive, false);
            }
        }
        if let Some(children) = self.field(obj, "children", path, true) {
            let path = path.key("children");
            if let Some(children) = self.tuple(children, &path, 2) {
                for (i, child) in children.iter().enumerate() {
                    self.node(child, &path.key(i));
                }
            }
        }
        self.extensions(obj, path);
    }

    fn leaf(&mut self, obj: &Map<String, Value>, path: &IssuePath) {
        self.string(obj, "alias", path, 1, false);
        self.mm_tuple(obj, "padding_mm", path, 4);
        self.boolean(obj, "debug_border", path);
        if let Some(elements) = self.field(obj, "elements", path, true) {
            let path = path.key("elements");
            if let Some(elements) = self.tuple(elements, &path, 1) {
                self.element(&elements[0], &path.key(0));
            }
        }
        self.extensions(obj, path);
    }

    // --- Elements ---

    fn element(&mut self, value: &Value, path: &IssuePath) {
        let Some(obj) = self.object(value, path) else {
            return;
        };
        self.string(obj, "id", path, 1, false);
        self.mm_tuple(obj, "padding_mm", path, 4);
        self.mm_tuple(obj, "min_size_mm", path, 2);
        self.mm_tuple(obj, "max_size_mm", path, 2);
        self.extensions(obj, path);

        match obj.get("type").and_then(Value::as_str) {
            Some("text") => {
                self.string(obj, "text", path, 0, true);
                self.text_fields(obj, path);
            }
            Some("qr") => self.qr(obj, path),
            Some("datamatrix") => self.datamatrix(obj, path),
            Some("image") => {
                if let Some(source) = self.field(obj, "source", path, true) {
                    let path = path.key("source");
                    if let Some(source) = self.object(source, &path) {
                        self.literal::<ImageSourceKind>(source, "kind", &path, true);
                        self.string(source, "data", &path, 1, true);
                    }
                }
                self.image_fields(obj, path);
            }
            Some("line") => {
                self.literal::<LineOrientation>(obj, "orientation", path, true);
                self.number(obj, "thickness_mm", path, Bound::Positive, true);
                self.literal::<LineAlign>(obj, "align", path, false);
            }
            _ => self.fail(&path.key("type"), UNKNOWN_ELEMENT_TYPE),
        }
    }

    /// Shared by text elements and the text defaults block.
    fn text_fields(&mut self, obj: &Map<String, Value>, path: &IssuePath) {
        self.number(obj, "font_height_mm", path, Bound::Positive, false);
        self.number(obj, "font_width_mm", path, Bound::Positive, false);
        self.literal::<TextWrap>(obj, "wrap", path, false);
        self.literal::<TextFit>(obj, "fit", path, false);
        self.integer(obj, "max_lines", path, 1, i64::from(u32::MAX), false);
        self.align(obj, path);
    }

    /// Shared by image elements and the image defaults block.
    fn image_fields(&mut self, obj: &Map<String, Value>, path: &IssuePath) {
        self.literal::<ImageFit>(obj, "fit", path, false);
        self.align(obj, path);
        self.integer(obj, "input_dpi", path, 1, i64::from(u32::MAX), false);
        self.integer(obj, "threshold", path, 0, 255, false);
        self.literal::<Dither>(obj, "dither", path, false);
        self.boolean(obj, "invert", path);
    }

    fn qr(&mut self, obj: &Map<String, Value>, path: &IssuePath) {
        self.string(obj, "data", path, 0, true);
        self.integer(obj, "magnification", path, 1, 10, false);
        self.literal::<SizeMode>(obj, "size_mode", path, false);
        self.literal::<RenderMode>(obj, "render_mode", path, false);
        self.align(obj, path);
        self.literal::<ErrorCorrection>(obj, "error_correction", path, false);
        self.literal::<QrInputMode>(obj, "input_mode", path, false);
        self.literal::<QrCharacterMode>(obj, "character_mode", path, false);
        self.number(obj, "quiet_zone_mm", path, Bound::NonNegative, false);
        if let Some(theme) = obj.get("theme") {
            let path = path.key("theme");
            if let Some(theme) = self.object(theme, &path) {
                self.literal::<QrThemePreset>(theme, "preset", &path, false);
                self.literal::<ModuleShape>(theme, "module_shape", &path, false);
                self.literal::<ModuleShape>(theme, "finder_shape", &path, false);
            }
        }
    }

    fn datamatrix(&mut self, obj: &Map<String, Value>, path: &IssuePath) {
        self.string(obj, "data", path, 0, true);
        self.number(obj, "module_size_mm", path, Bound::Positive, false);
        self.literal::<SizeMode>(obj, "size_mode", path, false);
        self.literal::<RenderMode>(obj, "render_mode", path, false);
        self.align(obj, path);
        self.integer(obj, "quality", path, 200, 200, false);
        self.integer(obj, "columns", path, 0, 49, false);
        self.integer(obj, "rows", path, 0, 49, false);
        self.integer(obj, "format_id", path, 0, 6, false);
        if let Some(Value::String(escape)) = obj.get("escape_char") {
            if escape.chars().count() != 1 {
                self.fail(&path.key("escape_char"), "String must contain exactly 1 character(s)");
            }
        } else {
            self.string(obj, "escape_char", path, 1, false);
        }
        self.number(obj, "quiet_zone_mm", path, Bound::NonNegative, false);
    }
}

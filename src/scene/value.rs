use crate::foundation::error::{PasslineError, PasslineResult};

/// Declared type of a node attribute, as the host reports it.
///
/// `Opaque` covers host attribute classes the pipeline does not classify
/// (matrices, message plugs, ...); values of opaque attributes are carried
/// through queries without coercion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrType {
    /// Scalar numeric attribute (floats, ints, enums).
    Number,
    /// Boolean attribute.
    Bool,
    /// String attribute.
    Text,
    /// Unclassified host attribute class; values pass through raw.
    Opaque,
}

/// A single attribute value.
///
/// The host stores layer-override payloads untyped (numerics for bools, raw
/// scalars for everything else); [`AttrValue::coerce`] re-types such a payload
/// against the attribute's declared [`AttrType`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// Boolean scalar. Listed first so untagged decoding tries it before
    /// the numeric variant.
    Bool(bool),
    /// Numeric scalar; hosts report ints and enums as doubles too.
    Number(f64),
    /// String scalar.
    Text(String),
}

impl AttrValue {
    /// The declared type this value infers on its own.
    pub fn attr_type(&self) -> AttrType {
        match self {
            AttrValue::Number(_) => AttrType::Number,
            AttrValue::Bool(_) => AttrType::Bool,
            AttrValue::Text(_) => AttrType::Text,
        }
    }

    /// Host-style truthiness: nonzero numbers, `true`, non-empty strings.
    pub fn truthy(&self) -> bool {
        match self {
            AttrValue::Number(v) => *v != 0.0,
            AttrValue::Bool(b) => *b,
            AttrValue::Text(s) => !s.is_empty(),
        }
    }

    /// Numeric reading: bools map to 0/1, text must parse.
    pub fn as_f64(&self) -> PasslineResult<f64> {
        match self {
            AttrValue::Number(v) => Ok(*v),
            AttrValue::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            AttrValue::Text(s) => s.parse::<f64>().map_err(|_| {
                PasslineError::validation(format!("cannot read '{s}' as a number"))
            }),
        }
    }

    /// Text rendering; whole numbers print without a fraction, host style.
    pub fn as_text(&self) -> String {
        match self {
            AttrValue::Number(v) => {
                if v.fract() == 0.0 && v.abs() < 1e15 {
                    format!("{}", *v as i64)
                } else {
                    format!("{v}")
                }
            }
            AttrValue::Bool(b) => b.to_string(),
            AttrValue::Text(s) => s.clone(),
        }
    }

    /// Re-type a raw stored value against a declared attribute type.
    ///
    /// `Opaque` declarations pass the raw value through unchanged.
    pub fn coerce(&self, ty: AttrType) -> PasslineResult<AttrValue> {
        match ty {
            AttrType::Number => Ok(AttrValue::Number(self.as_f64()?)),
            AttrType::Bool => Ok(AttrValue::Bool(self.truthy())),
            AttrType::Text => Ok(AttrValue::Text(self.as_text())),
            AttrType::Opaque => Ok(self.clone()),
        }
    }

    /// Convert into a JSON value for publish-instance metadata.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            AttrValue::Number(v) => serde_json::json!(v),
            AttrValue::Bool(b) => serde_json::json!(b),
            AttrValue::Text(s) => serde_json::json!(s),
        }
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Number(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Number(v as f64)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        AttrValue::Number(f64::from(v))
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Text(v.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Text(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerce_retypes_numeric_payloads_for_bool_attrs() {
        // Hosts store bool overrides as floats.
        let raw = AttrValue::Number(1.0);
        assert_eq!(raw.coerce(AttrType::Bool).unwrap(), AttrValue::Bool(true));

        let raw = AttrValue::Number(0.0);
        assert_eq!(raw.coerce(AttrType::Bool).unwrap(), AttrValue::Bool(false));
    }

    #[test]
    fn coerce_opaque_passes_through_unchanged() {
        let raw = AttrValue::Number(42.0);
        assert_eq!(raw.coerce(AttrType::Opaque).unwrap(), raw);
    }

    #[test]
    fn coerce_text_renders_whole_numbers_without_fraction() {
        let raw = AttrValue::Number(4.0);
        assert_eq!(
            raw.coerce(AttrType::Text).unwrap(),
            AttrValue::Text("4".to_owned())
        );

        let raw = AttrValue::Number(0.5);
        assert_eq!(
            raw.coerce(AttrType::Text).unwrap(),
            AttrValue::Text("0.5".to_owned())
        );
    }

    #[test]
    fn coerce_rejects_non_numeric_text_for_number_attrs() {
        let raw = AttrValue::Text("vray".to_owned());
        assert!(raw.coerce(AttrType::Number).is_err());
    }

    #[test]
    fn untagged_serde_maps_json_scalars() {
        let v: AttrValue = serde_json::from_str("true").unwrap();
        assert_eq!(v, AttrValue::Bool(true));

        let v: AttrValue = serde_json::from_str("2.5").unwrap();
        assert_eq!(v, AttrValue::Number(2.5));

        let v: AttrValue = serde_json::from_str("\"arnold\"").unwrap();
        assert_eq!(v, AttrValue::Text("arnold".to_owned()));
    }
}

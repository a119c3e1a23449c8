//! Merging of name configurations into the [`Registry`].
//!
//! A configuration is a JSON document such as:
//!
//! ```json
//! {
//!   "CLA": {
//!     "00": {
//!       "Name": "ISO 7816-4",
//!       "INS": {
//!         "A4": {
//!           "Name": "SELECT",
//!           "P1": [{ "Name": "Select by DF name", "val": "04" }],
//!           "P2": [{ "Name": "No response data", "val": "0C" }]
//!         }
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! Class entries may also sit directly at the root, without the `CLA` wrapper.
//! Anomalies never abort a merge; they are skipped and returned as [`Warning`]s.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::registry::{CodeName, InstructionDef, Param, Registry};
use crate::trace::{debug, info, warning};

const KEY_CLA: &str = "CLA";

/// Conventional location of the configuration, relative to a workspace root.
pub const CONFIG_PATH: &str = ".vscode/apdu_config.json";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration root must be a JSON object")]
    NotAnObject,
}

pub(crate) type Result<T> = std::result::Result<T, Error>;

/// A non-fatal anomaly found while merging.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Warning {
    #[error("Unknown key `{key}` in {scope}")]
    UnknownKey { scope: String, key: String },

    #[error("Invalid code `{code}` in {scope}")]
    InvalidCode { scope: String, code: String },

    #[error("Invalid entry {scope}: {reason}")]
    InvalidEntry { scope: String, reason: String },
}

#[derive(Deserialize)]
struct ClassEntry {
    #[serde(rename = "Name")]
    name: Option<String>,

    #[serde(rename = "INS")]
    ins: Option<Map<String, Value>>,

    #[serde(flatten)]
    unknown: Map<String, Value>,
}

#[derive(Deserialize)]
struct InstructionEntry {
    #[serde(rename = "Name")]
    name: String,

    #[serde(rename = "P1")]
    p1: Option<Vec<Value>>,

    #[serde(rename = "P2")]
    p2: Option<Vec<Value>>,

    #[serde(flatten)]
    unknown: Map<String, Value>,
}

#[derive(Deserialize)]
struct ParamEntry {
    #[serde(rename = "Name")]
    name: Option<String>,

    val: Option<String>,

    #[serde(flatten)]
    unknown: Map<String, Value>,
}

/// Collects warnings for a single merge.
#[derive(Default)]
struct Warnings(Vec<Warning>);

impl Warnings {
    fn push(&mut self, warning: Warning) {
        warning!("{}", warning);
        self.0.push(warning);
    }

    fn unknown_keys(&mut self, scope: &str, unknown: Map<String, Value>) {
        for key in unknown.into_iter().map(|(key, _)| key) {
            self.push(Warning::UnknownKey {
                scope: scope.to_owned(),
                key,
            });
        }
    }

    fn invalid_code(&mut self, scope: &str, code: &str) {
        self.push(Warning::InvalidCode {
            scope: scope.to_owned(),
            code: code.to_owned(),
        });
    }

    fn invalid_entry(&mut self, scope: &str, reason: impl ToString) {
        self.push(Warning::InvalidEntry {
            scope: scope.to_owned(),
            reason: reason.to_string(),
        });
    }
}

/// Parses a hex code such as `A4` or `0xA4`.
pub fn parse_code(text: &str) -> Option<u8> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);

    match digits.starts_with('+') {
        true => None,
        _ => u8::from_str_radix(digits, 16).ok(),
    }
}

impl Registry {
    /// Parses the text as a JSON configuration, then merges it.
    /// Nothing is merged if the text is not a JSON object.
    pub fn merge_str(&mut self, text: &str) -> Result<Vec<Warning>> {
        let document: Value = serde_json::from_str(text)?;

        self.merge(&document)
    }

    /// Merges the configuration document into the registry, returning the warnings
    /// raised on the way. Instructions are appended after any already known.
    pub fn merge(&mut self, document: &Value) -> Result<Vec<Warning>> {
        let root = document.as_object().ok_or(Error::NotAnObject)?;
        let mut warnings = Warnings::default();

        for (key, value) in root {
            if key == KEY_CLA {
                match value.as_object() {
                    Some(classes) => {
                        for (code, entry) in classes {
                            self.merge_class(code, entry, &mut warnings);
                        }
                    }
                    _ => warnings.invalid_entry(KEY_CLA, "expected an object of classes"),
                }
            } else if parse_code(key).is_some() {
                self.merge_class(key, value, &mut warnings);
            } else {
                warnings.push(Warning::UnknownKey {
                    scope: "root".to_owned(),
                    key: key.clone(),
                });
            }
        }

        Ok(warnings.0)
    }

    fn merge_class(&mut self, code: &str, entry: &Value, warnings: &mut Warnings) {
        let scope = format!("CLA {}", code);
        let Some(cla) = parse_code(code) else {
            return warnings.invalid_code(&scope, code);
        };

        let entry = match ClassEntry::deserialize(entry) {
            Ok(entry) => entry,
            Err(e) => return warnings.invalid_entry(&scope, e),
        };
        warnings.unknown_keys(&scope, entry.unknown);

        let family = self.family_mut(cla);
        if let Some(name) = entry.name {
            info!("Naming class {:02X} as {}", cla, name);
            family.class = CodeName::new(cla, name);
        }

        for (code, value) in entry.ins.into_iter().flatten() {
            let scope = format!("{} INS {}", scope, code);
            let Some(ins) = parse_code(&code) else {
                warnings.invalid_code(&scope, &code);
                continue;
            };

            match InstructionEntry::deserialize(&value) {
                Ok(def) => {
                    let def = instruction(ins, def, &scope, warnings);
                    debug!("Adding instruction {:02X} ({}) to {}", ins, def.name, family.class.name);
                    family.instructions.push(def);
                }
                Err(e) => warnings.invalid_entry(&scope, e),
            }
        }
    }
}

fn instruction(
    code: u8,
    entry: InstructionEntry,
    scope: &str,
    warnings: &mut Warnings,
) -> InstructionDef {
    warnings.unknown_keys(scope, entry.unknown);

    let mut def = InstructionDef::new(code, entry.name);
    if let Some(elements) = entry.p1 {
        def.p1 = params(Param::P1, elements, scope, warnings);
    }
    if let Some(elements) = entry.p2 {
        def.p2 = params(Param::P2, elements, scope, warnings);
    }

    def
}

fn params(param: Param, elements: Vec<Value>, scope: &str, warnings: &mut Warnings) -> Vec<CodeName> {
    let mut table = Vec::with_capacity(elements.len());

    for (index, element) in elements.iter().enumerate() {
        let scope = format!("{} {}[{}]", scope, param, index);
        let entry = match ParamEntry::deserialize(element) {
            Ok(entry) => entry,
            Err(e) => {
                warnings.invalid_entry(&scope, e);
                continue;
            }
        };
        warnings.unknown_keys(&scope, entry.unknown);

        // An element naming only one of the two fields contributes nothing.
        if let (Some(name), Some(val)) = (entry.name, entry.val) {
            match parse_code(&val) {
                Some(code) => table.push(CodeName::new(code, name)),
                None => warnings.invalid_code(&scope, &val),
            }
        }
    }

    match table.is_empty() {
        true => param.default_table(),
        _ => table,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::registry::UNKNOWN;

    #[test]
    fn test_parse_code() {
        assert_eq!(Some(0xA4), parse_code("A4"));
        assert_eq!(Some(0xA4), parse_code("a4"));
        assert_eq!(Some(0x0C), parse_code("0x0C"));
        assert_eq!(Some(0x04), parse_code("4"));
        assert_eq!(None, parse_code("100"));
        assert_eq!(None, parse_code("+1"));
        assert_eq!(None, parse_code("XY"));
        assert_eq!(None, parse_code(""));
    }

    #[test]
    fn test_code_round_trip() {
        for code in 0..=u8::MAX {
            assert_eq!(Some(code), parse_code(&format!("{:02X}", code)));
        }
    }

    #[test]
    fn test_merge_wrapped_classes() {
        let mut registry = Registry::new();
        let warnings = registry
            .merge(&json!({
                "CLA": {
                    "00": {
                        "Name": "ISO 7816-4",
                        "INS": {
                            "A4": {
                                "Name": "SELECT",
                                "P1": [{ "Name": "Select by DF name", "val": "04" }],
                                "P2": [{ "val": "0C", "Name": "No response data" }]
                            },
                            "B0": { "Name": "READ BINARY" }
                        }
                    },
                    "80": {
                        "Name": "JPKI",
                        "INS": { "2A": { "Name": "COMPUTE DIGITAL SIGNATURE" } }
                    }
                }
            }))
            .unwrap();

        assert!(warnings.is_empty(), "{:?}", warnings);

        let header = registry.lookup(0x00, 0xA4, 0x04, 0x0C);
        assert_eq!("ISO 7816-4", header.cla.name);
        assert_eq!("SELECT", header.ins.name);
        assert_eq!("Select by DF name", header.p1.name);
        assert_eq!("No response data", header.p2.name);

        let def = registry.interindustry().instruction(0xB0).unwrap();
        assert_eq!(Param::P1.default_table(), def.p1);
        assert_eq!(Param::P2.default_table(), def.p2);

        let header = registry.lookup(0x80, 0x2A, 0x00, 0x80);
        assert_eq!("JPKI", header.cla.name);
        assert_eq!("COMPUTE DIGITAL SIGNATURE", header.ins.name);
        assert_eq!("P1_Default", header.p1.name);
        assert_eq!(UNKNOWN, header.p2.name);
    }

    #[test]
    fn test_merge_root_classes() {
        let mut registry = Registry::new();
        registry
            .merge_str(r#"{ "84": { "Name": "Secure messaging" } }"#)
            .unwrap();

        assert_eq!("Secure messaging", registry.proprietary().class.name);
        assert_eq!(0x84, registry.proprietary().class.code);
        assert_eq!("Interindustry", registry.interindustry().class.name);
    }

    #[test]
    fn test_instructions_follow_document_order() {
        let mut registry = Registry::new();
        registry
            .merge(&json!({ "00": { "INS": {
                "B0": { "Name": "READ BINARY" },
                "20": { "Name": "VERIFY" },
                "A4": { "Name": "SELECT" }
            } } }))
            .unwrap();

        let codes: Vec<u8> = registry
            .interindustry()
            .instructions
            .iter()
            .map(|def| def.code)
            .collect();
        assert_eq!(vec![0xB0, 0x20, 0xA4], codes);
    }

    #[test]
    fn test_merges_accumulate() {
        let mut registry = Registry::new();
        registry
            .merge(&json!({ "00": { "Name": "First", "INS": { "A4": { "Name": "SELECT" } } } }))
            .unwrap();
        registry
            .merge(&json!({ "00": { "Name": "Second", "INS": { "A4": { "Name": "SELECT FILE" } } } }))
            .unwrap();

        assert_eq!(2, registry.interindustry().instructions.len());

        let header = registry.lookup(0x00, 0xA4, 0x00, 0x00);
        assert_eq!("Second", header.cla.name);
        assert_eq!("SELECT", header.ins.name);
    }

    #[test]
    fn test_non_zero_classes_merge_into_proprietary() {
        let mut registry = Registry::new();
        registry
            .merge(&json!({ "CLA": { "0C": { "INS": { "CA": { "Name": "GET DATA" } } } } }))
            .unwrap();

        assert!(registry.interindustry().instructions.is_empty());
        assert_eq!(
            "GET DATA",
            registry.lookup(0x80, 0xCA, 0x00, 0x00).ins.name
        );
    }

    #[test]
    fn test_incomplete_params_fall_back_to_default() {
        let mut registry = Registry::new();
        registry
            .merge(&json!({ "00": { "INS": { "20": {
                "Name": "VERIFY",
                "P1": [{ "Name": "No val" }, { "val": "01" }],
                "P2": []
            } } } }))
            .unwrap();

        let def = registry.interindustry().instruction(0x20).unwrap();
        assert_eq!(Param::P1.default_table(), def.p1);
        assert_eq!(Param::P2.default_table(), def.p2);
    }

    #[test]
    fn test_warnings_do_not_abort() {
        let mut registry = Registry::new();
        let warnings = registry
            .merge(&json!({
                "Comment": "not a class",
                "CLA": {
                    "ZZ": { "Name": "Bad" },
                    "00": {
                        "Name": "ISO",
                        "Extra": true,
                        "INS": {
                            "G1": { "Name": "Bad code" },
                            "CA": { "P1": [] },
                            "A4": {
                                "Name": "SELECT",
                                "Le": "00",
                                "P1": [{ "Name": "Bad val", "val": "1FF" }, 7]
                            },
                            "B0": { "Name": "READ BINARY" }
                        }
                    }
                }
            }))
            .unwrap();

        assert_eq!(8, warnings.len(), "{:#?}", warnings);
        assert_eq!(
            Warning::UnknownKey {
                scope: "root".to_owned(),
                key: "Comment".to_owned()
            },
            warnings[0],
        );
        assert_eq!(
            Warning::InvalidCode {
                scope: "CLA ZZ".to_owned(),
                code: "ZZ".to_owned()
            },
            warnings[1],
        );
        assert_eq!(
            Warning::UnknownKey {
                scope: "CLA 00".to_owned(),
                key: "Extra".to_owned()
            },
            warnings[2],
        );
        assert!(matches!(&warnings[3], Warning::InvalidCode { code, .. } if code == "G1"));
        assert!(matches!(&warnings[4], Warning::InvalidEntry { scope, .. } if scope == "CLA 00 INS CA"));
        assert!(matches!(&warnings[5], Warning::UnknownKey { key, .. } if key == "Le"));
        assert!(matches!(&warnings[6], Warning::InvalidCode { scope, code } if scope == "CLA 00 INS A4 P1[0]" && code == "1FF"));
        assert!(matches!(&warnings[7], Warning::InvalidEntry { scope, .. } if scope == "CLA 00 INS A4 P1[1]"));

        // Everything valid was merged nonetheless.
        assert_eq!("ISO", registry.interindustry().class.name);
        let codes: Vec<u8> = registry
            .interindustry()
            .instructions
            .iter()
            .map(|def| def.code)
            .collect();
        assert_eq!(vec![0xA4, 0xB0], codes);
    }

    #[test]
    fn test_invalid_documents() {
        let mut registry = Registry::new();

        assert!(matches!(registry.merge_str("{"), Err(Error::Json(_))));
        assert!(matches!(registry.merge(&json!([1, 2])), Err(Error::NotAnObject)));
        assert_eq!(Registry::new(), registry);
    }
}

//! Programs: one compiled variant of a pass per macro signature.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::binding::MacroValue;

/// Shared program handle.
pub type ProgramPtr = Rc<Program>;

/// The macros a program is compiled with.
pub type ProgramSignature = BTreeMap<String, MacroValue>;

/// A pass variant. Draw calls sharing a signature share the program.
#[derive(Debug, PartialEq, Eq)]
pub struct Program {
    pass_name: String,
    signature: ProgramSignature,
}

impl Program {
    /// Creates a program for `pass_name` with `signature`.
    #[must_use]
    pub fn new(pass_name: impl Into<String>, signature: ProgramSignature) -> ProgramPtr {
        Rc::new(Self {
            pass_name: pass_name.into(),
            signature,
        })
    }

    /// Name of the pass this program belongs to.
    #[inline]
    #[must_use]
    pub fn pass_name(&self) -> &str {
        &self.pass_name
    }

    /// Defined macros and their values.
    #[inline]
    #[must_use]
    pub fn signature(&self) -> &ProgramSignature {
        &self.signature
    }

    /// Returns true if macro `name` is defined.
    #[must_use]
    pub fn is_defined(&self, name: &str) -> bool {
        self.signature.contains_key(name)
    }

    /// Value of integer macro `name`.
    #[must_use]
    pub fn macro_value(&self, name: &str) -> Option<i32> {
        match self.signature.get(name) {
            Some(MacroValue::Int(value)) => Some(*value),
            _ => None,
        }
    }

    /// Defined macro names, sorted.
    #[must_use]
    pub fn defined_macro_names(&self) -> Vec<&str> {
        self.signature.keys().map(String::as_str).collect()
    }

    /// The `#define` block prepended to the shader sources.
    #[must_use]
    pub fn defines(&self) -> String {
        self.signature
            .iter()
            .map(|(name, value)| match value {
                MacroValue::Defined => format!("#define {name}\n"),
                MacroValue::Int(value) => format!("#define {name} {value}\n"),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_queries() {
        let program = Program::new(
            "main",
            BTreeMap::from([
                (String::from("NUM_LIGHTS"), MacroValue::Int(3)),
                (String::from("DIFFUSE_MAP"), MacroValue::Defined),
            ]),
        );

        assert!(program.is_defined("DIFFUSE_MAP"));
        assert!(!program.is_defined("NORMAL_MAP"));
        assert_eq!(program.macro_value("NUM_LIGHTS"), Some(3));
        assert_eq!(program.macro_value("DIFFUSE_MAP"), None);
        assert_eq!(program.defined_macro_names(), vec!["DIFFUSE_MAP", "NUM_LIGHTS"]);
        assert_eq!(program.defines(), "#define DIFFUSE_MAP\n#define NUM_LIGHTS 3\n");
    }
}

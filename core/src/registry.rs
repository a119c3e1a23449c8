//! Name registry for CLA, INS, P1 and P2 codes.
//!
//! Commands are split into two families by the top bit of CLA: interindustry commands
//! (`0x00`–`0x7F`) and proprietary commands (`0x80`–`0xFF`). Each family carries a
//! display name for its class and an ordered list of instruction definitions.

use std::fmt;

pub const CLA_INTERINDUSTRY: u8 = 0x00;
pub const CLA_PROPRIETARY: u8 = 0x80;

const CLA_INTERINDUSTRY_NAME: &str = "Interindustry";
const CLA_PROPRIETARY_NAME: &str = "Proprietary";

pub const UNKNOWN: &str = "Unknown";

/// Kind of a parameter byte.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Param {
    P1,
    P2,
}

impl Param {
    /// Label of the parameter when its value is zero.
    pub fn default_name(self) -> &'static str {
        match self {
            Param::P1 => "P1_Default",
            Param::P2 => "P2_Default",
        }
    }

    /// Table holding the single default entry of this parameter.
    pub fn default_table(self) -> Vec<CodeName> {
        vec![CodeName::new(0x00, self.default_name())]
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::P1 => f.write_str("P1"),
            Param::P2 => f.write_str("P2"),
        }
    }
}

/// A numeric code paired with its display name.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CodeName {
    pub code: u8,
    pub name: String,
}

impl CodeName {
    pub fn new(code: u8, name: impl Into<String>) -> Self {
        Self {
            code,
            name: name.into(),
        }
    }

    fn unknown(code: u8) -> Self {
        Self::new(code, UNKNOWN)
    }
}

/// An instruction, with the names of its known P1 and P2 values.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstructionDef {
    pub code: u8,
    pub name: String,
    pub p1: Vec<CodeName>,
    pub p2: Vec<CodeName>,
}

impl InstructionDef {
    /// Creates an instruction having only the default P1 and P2 entries.
    pub fn new(code: u8, name: impl Into<String>) -> Self {
        Self {
            code,
            name: name.into(),
            p1: Param::P1.default_table(),
            p2: Param::P2.default_table(),
        }
    }

    fn params(&self, param: Param) -> &[CodeName] {
        match param {
            Param::P1 => &self.p1,
            Param::P2 => &self.p2,
        }
    }
}

/// A family of commands sharing a class.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandFamily {
    pub class: CodeName,
    pub instructions: Vec<InstructionDef>,
}

impl CommandFamily {
    fn new(code: u8, name: &str) -> Self {
        Self {
            class: CodeName::new(code, name),
            instructions: vec![],
        }
    }

    /// Finds the first instruction having the code.
    pub fn instruction(&self, code: u8) -> Option<&InstructionDef> {
        self.instructions.iter().find(|ins| ins.code == code)
    }
}

/// Header of a command, with each byte resolved to a display name.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DecodedHeader {
    pub cla: CodeName,
    pub ins: CodeName,
    pub p1: CodeName,
    pub p2: CodeName,
}

/// Holds the names of both command families.
///
/// Starts out knowing nothing but the two class names, and only grows through
/// [`Registry::merge`]. Merges append: loading the same configuration twice duplicates
/// its instructions, and lookups keep resolving to the first definition.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Registry {
    interindustry: CommandFamily,
    proprietary: CommandFamily,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            interindustry: CommandFamily::new(CLA_INTERINDUSTRY, CLA_INTERINDUSTRY_NAME),
            proprietary: CommandFamily::new(CLA_PROPRIETARY, CLA_PROPRIETARY_NAME),
        }
    }
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Default::default()
    }

    pub fn interindustry(&self) -> &CommandFamily {
        &self.interindustry
    }

    pub fn proprietary(&self) -> &CommandFamily {
        &self.proprietary
    }

    /// Selects the family a class byte belongs to.
    pub fn family(&self, cla: u8) -> &CommandFamily {
        match is_proprietary(cla) {
            true => &self.proprietary,
            _ => &self.interindustry,
        }
    }

    pub(crate) fn family_mut(&mut self, cla: u8) -> &mut CommandFamily {
        // Only an exact 0x00 targets the interindustry family while merging.
        match cla {
            CLA_INTERINDUSTRY => &mut self.interindustry,
            _ => &mut self.proprietary,
        }
    }

    /// Resolves the names of a command header. Never fails: codes nobody named stay
    /// `Unknown`, and zero parameters fall back to their default label.
    pub fn lookup(&self, cla: u8, ins: u8, p1: u8, p2: u8) -> DecodedHeader {
        let family = self.family(cla);
        let mut header = DecodedHeader {
            cla: CodeName::new(cla, family.class.name.as_str()),
            ins: CodeName::unknown(ins),
            p1: initial_param(Param::P1, p1),
            p2: initial_param(Param::P2, p2),
        };

        if let Some(def) = family.instruction(ins) {
            header.ins.name = def.name.clone();
            resolve_param(&mut header.p1, def.params(Param::P1));
            resolve_param(&mut header.p2, def.params(Param::P2));
        }

        header
    }
}

/// Whether the class byte denotes a proprietary command.
pub fn is_proprietary(cla: u8) -> bool {
    cla & CLA_PROPRIETARY == CLA_PROPRIETARY
}

fn initial_param(param: Param, code: u8) -> CodeName {
    match code {
        0x00 => CodeName::new(code, param.default_name()),
        _ => CodeName::unknown(code),
    }
}

// Unlike instructions, a later parameter entry overrides an earlier one.
fn resolve_param(target: &mut CodeName, table: &[CodeName]) {
    if let Some(entry) = table.iter().rev().find(|entry| entry.code == target.code) {
        target.name = entry.name.clone();
    }
}

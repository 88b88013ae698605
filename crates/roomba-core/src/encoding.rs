/// Behavioral opcode groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpcodeClass {
    /// Saturating arithmetic on `A`.
    Arithmetic,
    /// Instruction-pointer and card movement.
    ControlFlow,
    /// Loads into `A`, optionally rolling the old `A` into another register.
    RegisterTransfer,
    /// Mode-starting opcodes and the peripheral call.
    Actuation,
}

/// The sixteen VM opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Opcode {
    Add,
    Sub,
    Mul,
    Dvm,
    Jmp,
    Jby,
    Crd,
    Crj,
    Lda,
    Rlb,
    Rlc,
    Rld,
    Mov,
    Rot,
    Phl,
    Slp,
}

/// Single source-of-truth mnemonic table.
///
/// Names here are the persisted opcode names; any other name is unknown.
pub const OPCODE_TABLE: &[(&str, Opcode, OpcodeClass)] = &[
    ("ADD", Opcode::Add, OpcodeClass::Arithmetic),
    ("SUB", Opcode::Sub, OpcodeClass::Arithmetic),
    ("MUL", Opcode::Mul, OpcodeClass::Arithmetic),
    ("DVM", Opcode::Dvm, OpcodeClass::Arithmetic),
    ("JMP", Opcode::Jmp, OpcodeClass::ControlFlow),
    ("JBY", Opcode::Jby, OpcodeClass::ControlFlow),
    ("CRD", Opcode::Crd, OpcodeClass::ControlFlow),
    ("CRJ", Opcode::Crj, OpcodeClass::ControlFlow),
    ("LDA", Opcode::Lda, OpcodeClass::RegisterTransfer),
    ("RLB", Opcode::Rlb, OpcodeClass::RegisterTransfer),
    ("RLC", Opcode::Rlc, OpcodeClass::RegisterTransfer),
    ("RLD", Opcode::Rld, OpcodeClass::RegisterTransfer),
    ("MOV", Opcode::Mov, OpcodeClass::Actuation),
    ("ROT", Opcode::Rot, OpcodeClass::Actuation),
    ("PHL", Opcode::Phl, OpcodeClass::Actuation),
    ("SLP", Opcode::Slp, OpcodeClass::Actuation),
];

impl Opcode {
    /// All opcodes in table order.
    pub const ALL: [Self; 16] = [
        Self::Add,
        Self::Sub,
        Self::Mul,
        Self::Dvm,
        Self::Jmp,
        Self::Jby,
        Self::Crd,
        Self::Crj,
        Self::Lda,
        Self::Rlb,
        Self::Rlc,
        Self::Rld,
        Self::Mov,
        Self::Rot,
        Self::Phl,
        Self::Slp,
    ];

    /// Upper-case mnemonic, also used as the persisted name.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Sub => "SUB",
            Self::Mul => "MUL",
            Self::Dvm => "DVM",
            Self::Jmp => "JMP",
            Self::Jby => "JBY",
            Self::Crd => "CRD",
            Self::Crj => "CRJ",
            Self::Lda => "LDA",
            Self::Rlb => "RLB",
            Self::Rlc => "RLC",
            Self::Rld => "RLD",
            Self::Mov => "MOV",
            Self::Rot => "ROT",
            Self::Phl => "PHL",
            Self::Slp => "SLP",
        }
    }

    /// Resolves an exact persisted name.
    #[must_use]
    pub fn from_mnemonic(name: &str) -> Option<Self> {
        OPCODE_TABLE
            .iter()
            .find(|(entry, _, _)| *entry == name)
            .map(|(_, opcode, _)| *opcode)
    }

    /// Behavioral group of this opcode.
    #[must_use]
    pub const fn class(self) -> OpcodeClass {
        match self {
            Self::Add | Self::Sub | Self::Mul | Self::Dvm => OpcodeClass::Arithmetic,
            Self::Jmp | Self::Jby | Self::Crd | Self::Crj => OpcodeClass::ControlFlow,
            Self::Lda | Self::Rlb | Self::Rlc | Self::Rld => OpcodeClass::RegisterTransfer,
            Self::Mov | Self::Rot | Self::Phl | Self::Slp => OpcodeClass::Actuation,
        }
    }

    /// Returns `true` for the opcodes that hand control to the host.
    #[must_use]
    pub const fn starts_mode(self) -> bool {
        matches!(self, Self::Mov | Self::Rot | Self::Slp)
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

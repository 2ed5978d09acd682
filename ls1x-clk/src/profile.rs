//! # Per-variant topology profiles
//!
//! Everything a chip variant knows about its clock tree lives here as
//! compiled-in constant data: the ordered (bottom-up) clock list with each
//! stage's kind and register field layout, and the legacy consumer alias
//! list. The graph builder in [crate::clocks] is entirely driven by these
//! tables, so adding a variant means adding data, not code.
//!
//! Field layouts and formulas follow the consolidated Loongson-1 clock
//! driver. The chip documentation also circulates an alternate, conflicting
//! description of the LS1C PLL/divider layout; the consolidated driver's
//! layout is treated as authoritative here.
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::clocks::{
    ClockKind, DivTableEntry, DivTableSpec, DividerRounding, DividerSpec, MuxSpec, PllFormula,
    PllSpec,
};
use crate::regs::{DIV_OFFSET, FREQ_OFFSET, RegisterField};
use crate::time::Hertz;

/// Reference to a parent clock in a profile declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentRef {
    /// A clock declared earlier in the same profile.
    Clock(&'static str),
    /// The externally supplied oscillator root.
    Osc,
}

/// One clock declaration inside a profile.
#[derive(Debug, Clone, Copy)]
pub struct ClockDecl {
    pub name: &'static str,
    pub parents: &'static [ParentRef],
    pub kind: ClockKind,
}

/// One legacy consumer lookup entry.
///
/// Several consumers may alias the same clock; the AHB clock for example is
/// also the DMA engine and Ethernet MAC clock.
#[derive(Debug, Clone, Copy)]
pub struct AliasDecl {
    /// Name of the aliased clock within the graph.
    pub clock: &'static str,
    /// Consumer device name.
    pub consumer: &'static str,
    /// Optional connection id for consumers with more than one clock input.
    pub con_id: Option<&'static str>,
}

/// Declarative description of one chip variant's clock tree.
#[derive(Debug, Clone, Copy)]
pub struct VariantProfile {
    /// Device tree compatible string selecting this variant.
    pub compatible: &'static str,
    pub clocks: &'static [ClockDecl],
    pub aliases: &'static [AliasDecl],
}

/// Crystal rate of the LS1B reference boards.
pub const LS1B_OSC: Hertz = Hertz::from_raw(33 * 1_000_000);
/// Crystal rate of the LS1C reference boards.
pub const LS1C_OSC: Hertz = Hertz::from_raw(24 * 1_000_000);

/// Cell indices of the LS1B clocks, as used by the description provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(usize)]
pub enum Ls1bClock {
    Pll = 0,
    CpuDiv = 1,
    Cpu = 2,
    DcDiv = 3,
    Dc = 4,
    DdrDiv = 5,
    Ddr = 6,
    Ahb = 7,
    Apb = 8,
}

/// Cell indices of the LS1C clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(usize)]
pub enum Ls1cClock {
    Pll = 0,
    Cpu = 1,
    Dc = 2,
    Ddr = 3,
    Ahb = 4,
    Apb = 5,
}

// LS1B divisor word fields. The CPU/DC/DDR dividers sit in the DIV word
// together with their gate bits and the three bypass mux select bits.
const LS1B_DIV_CPU: RegisterField = RegisterField::new(DIV_OFFSET, 20, 4);
const LS1B_DIV_DC: RegisterField = RegisterField::new(DIV_OFFSET, 26, 4);
const LS1B_DIV_DDR: RegisterField = RegisterField::new(DIV_OFFSET, 14, 4);
const LS1B_DIV_CPU_EN: u32 = 25;
const LS1B_DIV_DC_EN: u32 = 31;
const LS1B_DIV_DDR_EN: u32 = 19;
const LS1B_BYPASS_CPU: u32 = 8;
const LS1B_BYPASS_DC: u32 = 12;
const LS1B_BYPASS_DDR: u32 = 10;

/// LS1B: each functional clock is a one-based divider from the PLL with an
/// oscillator bypass mux behind it; AHB trails the DDR clock and APB runs at
/// half the AHB rate.
pub static LS1B_PROFILE: VariantProfile = VariantProfile {
    compatible: "loongson,ls1b-clock",
    clocks: &[
        ClockDecl {
            name: "pll_clk",
            parents: &[ParentRef::Osc],
            kind: ClockKind::Pll(PllSpec {
                formula: PllFormula::Ls1b,
                mult: RegisterField::new(FREQ_OFFSET, 0, 6),
                frac: None,
            }),
        },
        ClockDecl {
            name: "cpu_clk_div",
            parents: &[ParentRef::Clock("pll_clk")],
            kind: ClockKind::Divider(DividerSpec {
                field: LS1B_DIV_CPU,
                one_based: true,
                rounding: DividerRounding::Closest,
                enable_bit: Some(LS1B_DIV_CPU_EN),
            }),
        },
        ClockDecl {
            name: "cpu_clk",
            parents: &[ParentRef::Clock("cpu_clk_div"), ParentRef::Osc],
            kind: ClockKind::Mux(MuxSpec {
                select: RegisterField::bit(DIV_OFFSET, LS1B_BYPASS_CPU),
                select_enable: None,
            }),
        },
        ClockDecl {
            name: "dc_clk_div",
            parents: &[ParentRef::Clock("pll_clk")],
            kind: ClockKind::Divider(DividerSpec {
                field: LS1B_DIV_DC,
                one_based: true,
                rounding: DividerRounding::Truncate,
                enable_bit: Some(LS1B_DIV_DC_EN),
            }),
        },
        ClockDecl {
            name: "dc_clk",
            parents: &[ParentRef::Clock("dc_clk_div"), ParentRef::Osc],
            kind: ClockKind::Mux(MuxSpec {
                select: RegisterField::bit(DIV_OFFSET, LS1B_BYPASS_DC),
                select_enable: None,
            }),
        },
        ClockDecl {
            name: "ddr_clk_div",
            parents: &[ParentRef::Clock("pll_clk")],
            kind: ClockKind::Divider(DividerSpec {
                field: LS1B_DIV_DDR,
                one_based: true,
                rounding: DividerRounding::Truncate,
                enable_bit: Some(LS1B_DIV_DDR_EN),
            }),
        },
        ClockDecl {
            name: "ddr_clk",
            parents: &[ParentRef::Clock("ddr_clk_div"), ParentRef::Osc],
            kind: ClockKind::Mux(MuxSpec {
                select: RegisterField::bit(DIV_OFFSET, LS1B_BYPASS_DDR),
                select_enable: None,
            }),
        },
        ClockDecl {
            name: "ahb_clk",
            parents: &[ParentRef::Clock("ddr_clk")],
            kind: ClockKind::FixedFactor { mult: 1, div: 1 },
        },
        ClockDecl {
            name: "apb_clk",
            parents: &[ParentRef::Clock("ahb_clk")],
            kind: ClockKind::FixedFactor { mult: 1, div: 2 },
        },
    ],
    aliases: &[
        AliasDecl {
            clock: "pll_clk",
            consumer: "pll_clk",
            con_id: None,
        },
        AliasDecl {
            clock: "cpu_clk_div",
            consumer: "cpu_clk_div",
            con_id: None,
        },
        AliasDecl {
            clock: "cpu_clk",
            consumer: "cpu_clk",
            con_id: None,
        },
        AliasDecl {
            clock: "dc_clk_div",
            consumer: "dc_clk_div",
            con_id: None,
        },
        AliasDecl {
            clock: "dc_clk",
            consumer: "dc_clk",
            con_id: None,
        },
        AliasDecl {
            clock: "ddr_clk_div",
            consumer: "ddr_clk_div",
            con_id: None,
        },
        AliasDecl {
            clock: "ddr_clk",
            consumer: "ddr_clk",
            con_id: None,
        },
        AliasDecl {
            clock: "ahb_clk",
            consumer: "ahb_clk",
            con_id: None,
        },
        AliasDecl {
            clock: "ahb_clk",
            consumer: "ls1x-dma",
            con_id: None,
        },
        AliasDecl {
            clock: "ahb_clk",
            consumer: "stmmaceth",
            con_id: None,
        },
        AliasDecl {
            clock: "apb_clk",
            consumer: "apb_clk",
            con_id: None,
        },
        AliasDecl {
            clock: "apb_clk",
            consumer: "ls1x-ac97",
            con_id: None,
        },
        AliasDecl {
            clock: "apb_clk",
            consumer: "ls1x-i2c",
            con_id: None,
        },
        AliasDecl {
            clock: "apb_clk",
            consumer: "ls1x-nand",
            con_id: None,
        },
        AliasDecl {
            clock: "apb_clk",
            consumer: "ls1x-pwmtimer",
            con_id: None,
        },
        AliasDecl {
            clock: "apb_clk",
            consumer: "ls1x-spi",
            con_id: None,
        },
        AliasDecl {
            clock: "apb_clk",
            consumer: "ls1x-wdt",
            con_id: None,
        },
        AliasDecl {
            clock: "apb_clk",
            consumer: "serial8250",
            con_id: None,
        },
    ],
};

// LS1C divisor word fields.
const LS1C_DIV_CPU: RegisterField = RegisterField::new(DIV_OFFSET, 8, 7);
const LS1C_DIV_DC: RegisterField = RegisterField::new(DIV_OFFSET, 24, 7);
const LS1C_DIV_CPU_EN: u32 = 15;
const LS1C_DIV_DC_EN: u32 = 31;

// LS1C PLL frequency word fields. The low two bits of the same word encode
// the SDRAM divisor.
const LS1C_PLL_MULT: RegisterField = RegisterField::new(FREQ_OFFSET, 8, 8);
const LS1C_PLL_FRAC: RegisterField = RegisterField::new(FREQ_OFFSET, 16, 8);
const LS1C_DIV_SDRAM: RegisterField = RegisterField::new(FREQ_OFFSET, 0, 2);

static LS1C_SDRAM_DIV_TABLE: &[DivTableEntry] = &[
    DivTableEntry { val: 0, div: 2 },
    DivTableEntry { val: 1, div: 4 },
    DivTableEntry { val: 2, div: 3 },
    DivTableEntry { val: 3, div: 3 },
];

/// LS1C: no bypass muxes; the SDRAM clock is a table divider off the CPU
/// clock and APB runs at the full AHB rate.
pub static LS1C_PROFILE: VariantProfile = VariantProfile {
    compatible: "loongson,ls1c-clock",
    clocks: &[
        ClockDecl {
            name: "pll_clk",
            parents: &[ParentRef::Osc],
            kind: ClockKind::Pll(PllSpec {
                formula: PllFormula::Ls1c,
                mult: LS1C_PLL_MULT,
                frac: Some(LS1C_PLL_FRAC),
            }),
        },
        ClockDecl {
            name: "cpu_clk",
            parents: &[ParentRef::Clock("pll_clk")],
            kind: ClockKind::Divider(DividerSpec {
                field: LS1C_DIV_CPU,
                one_based: true,
                rounding: DividerRounding::Closest,
                enable_bit: Some(LS1C_DIV_CPU_EN),
            }),
        },
        ClockDecl {
            name: "dc_clk",
            parents: &[ParentRef::Clock("pll_clk")],
            kind: ClockKind::Divider(DividerSpec {
                field: LS1C_DIV_DC,
                one_based: true,
                rounding: DividerRounding::Truncate,
                enable_bit: Some(LS1C_DIV_DC_EN),
            }),
        },
        ClockDecl {
            name: "ddr_clk",
            parents: &[ParentRef::Clock("cpu_clk")],
            kind: ClockKind::DividerTable(DivTableSpec {
                field: LS1C_DIV_SDRAM,
                table: LS1C_SDRAM_DIV_TABLE,
                allow_zero: true,
            }),
        },
        ClockDecl {
            name: "ahb_clk",
            parents: &[ParentRef::Clock("ddr_clk")],
            kind: ClockKind::FixedFactor { mult: 1, div: 1 },
        },
        ClockDecl {
            name: "apb_clk",
            parents: &[ParentRef::Clock("ahb_clk")],
            kind: ClockKind::FixedFactor { mult: 1, div: 1 },
        },
    ],
    aliases: &[
        AliasDecl {
            clock: "pll_clk",
            consumer: "pll_clk",
            con_id: None,
        },
        AliasDecl {
            clock: "cpu_clk",
            consumer: "cpu_clk",
            con_id: None,
        },
        AliasDecl {
            clock: "dc_clk",
            consumer: "dc_clk",
            con_id: None,
        },
        AliasDecl {
            clock: "ddr_clk",
            consumer: "ddr_clk",
            con_id: None,
        },
        AliasDecl {
            clock: "ahb_clk",
            consumer: "ahb_clk",
            con_id: None,
        },
        AliasDecl {
            clock: "ahb_clk",
            consumer: "ls1x-dma",
            con_id: None,
        },
        AliasDecl {
            clock: "ahb_clk",
            consumer: "stmmaceth",
            con_id: None,
        },
        AliasDecl {
            clock: "apb_clk",
            consumer: "apb_clk",
            con_id: None,
        },
        AliasDecl {
            clock: "apb_clk",
            consumer: "ls1x-ac97",
            con_id: None,
        },
        AliasDecl {
            clock: "apb_clk",
            consumer: "ls1x-i2c",
            con_id: None,
        },
        AliasDecl {
            clock: "apb_clk",
            consumer: "ls1x-nand",
            con_id: None,
        },
        AliasDecl {
            clock: "apb_clk",
            consumer: "ls1x-pwmtimer",
            con_id: None,
        },
        AliasDecl {
            clock: "apb_clk",
            consumer: "ls1x-spi",
            con_id: None,
        },
        AliasDecl {
            clock: "apb_clk",
            consumer: "ls1x-wdt",
            con_id: None,
        },
        AliasDecl {
            clock: "apb_clk",
            consumer: "serial8250",
            con_id: None,
        },
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_fields_are_well_formed() {
        for profile in [&LS1B_PROFILE, &LS1C_PROFILE] {
            for decl in profile.clocks {
                match decl.kind {
                    ClockKind::Pll(spec) => {
                        assert_eq!(spec.mult.validate(), Ok(()));
                        if let Some(frac) = spec.frac {
                            assert_eq!(frac.validate(), Ok(()));
                        }
                    }
                    ClockKind::Divider(spec) => assert_eq!(spec.field.validate(), Ok(())),
                    ClockKind::DividerTable(spec) => {
                        assert_eq!(spec.field.validate(), Ok(()));
                        assert!(!spec.table.is_empty());
                    }
                    ClockKind::Mux(spec) => assert_eq!(spec.select.width, 1),
                    ClockKind::FixedRate(_) => (),
                    ClockKind::FixedFactor { div, .. } => assert_ne!(div, 0),
                }
            }
        }
    }

    #[test]
    fn alias_targets_are_declared() {
        for profile in [&LS1B_PROFILE, &LS1C_PROFILE] {
            for alias in profile.aliases {
                assert!(
                    profile.clocks.iter().any(|decl| decl.name == alias.clock),
                    "alias target {} missing",
                    alias.clock
                );
            }
        }
    }

    #[test]
    fn cell_index_enums_match_declaration_order() {
        assert_eq!(LS1B_PROFILE.clocks.len(), 9);
        assert_eq!(LS1C_PROFILE.clocks.len(), 6);
        assert_eq!(LS1B_PROFILE.clocks[Ls1bClock::DdrDiv as usize].name, "ddr_clk_div");
        assert_eq!(LS1B_PROFILE.clocks[Ls1bClock::Apb as usize].name, "apb_clk");
        assert_eq!(LS1C_PROFILE.clocks[Ls1cClock::Ddr as usize].name, "ddr_clk");
        assert_eq!(Ls1cClock::try_from(5usize).unwrap(), Ls1cClock::Apb);
        assert!(Ls1cClock::try_from(6usize).is_err());
    }
}

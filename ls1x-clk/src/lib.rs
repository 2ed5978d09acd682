//! # Clock tree driver for the Loongson-1 SoC family
//!
//! The LS1B and LS1C derive all of their functional clock domains (CPU,
//! SDRAM/DDR, display controller, AHB and APB buses) from one board
//! oscillator through a PLL and a handful of dividers and bypass muxes, all
//! configured through two 32-bit words of a shared register block. This
//! crate models that derivation chain as a small clock graph:
//!
//! - [profile] holds the declarative, compiled-in topology of each variant;
//! - [clocks] builds the graph from a profile and answers rate queries,
//!   gate and reparent requests against live hardware state;
//! - [clkdev] resolves legacy `(consumer, connection id)` lookups;
//! - [regs] guards the shared configuration words.
//!
//! Platform bring-up picks a [Variant], maps the register block and hands
//! both, together with the board oscillator, to [init]:
//!
//! ```no_run
//! use ls1x_clk::{Variant, init};
//! use ls1x_clk::clocks::Oscillator;
//! use ls1x_clk::regs::{CLK_BASE_ADDR, RegisterBlock};
//!
//! let variant = Variant::from_compatible("loongson,ls1c-clock").unwrap();
//! // KSEG1 mapping of the clock configuration block.
//! let regs = unsafe { RegisterBlock::new((0xa000_0000 + CLK_BASE_ADDR) as *mut u32) };
//! let osc = Oscillator { name: "osc_clk", rate: variant.default_osc_rate() };
//! let (graph, aliases) = init(variant, regs, osc).unwrap();
//! let cpu = graph.by_name("cpu_clk").unwrap();
//! let rate = graph.rate(cpu).unwrap();
//! ```
#![no_std]

pub mod clkdev;
pub mod clocks;
pub mod profile;
pub mod regs;
pub mod time;

pub use clkdev::ConsumerAliasTable;
pub use clocks::{Clock, ClockGraph, Oscillator};

use clkdev::AliasError;
use clocks::BuildError;
use profile::{LS1B_PROFILE, LS1C_PROFILE, VariantProfile};
use regs::RegisterBlock;
use time::Hertz;

/// Chip variants supported by this driver.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Variant {
    Ls1b,
    Ls1c,
}

impl Variant {
    /// Select a variant by its device tree compatible string.
    pub fn from_compatible(compatible: &str) -> Option<Self> {
        if compatible == LS1B_PROFILE.compatible {
            Some(Variant::Ls1b)
        } else if compatible == LS1C_PROFILE.compatible {
            Some(Variant::Ls1c)
        } else {
            None
        }
    }

    pub const fn profile(&self) -> &'static VariantProfile {
        match self {
            Variant::Ls1b => &LS1B_PROFILE,
            Variant::Ls1c => &LS1C_PROFILE,
        }
    }

    /// Crystal rate of the reference boards, for platforms whose description
    /// does not carry an oscillator rate.
    pub const fn default_osc_rate(&self) -> Hertz {
        match self {
            Variant::Ls1b => profile::LS1B_OSC,
            Variant::Ls1c => profile::LS1C_OSC,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, thiserror::Error)]
pub enum InitError {
    #[error("clock graph: {0}")]
    Build(#[from] BuildError),
    #[error("alias table: {0}")]
    Alias(#[from] AliasError),
}

/// Build the clock graph and consumer alias table for one variant.
///
/// This is the whole bring-up sequence: on success the returned pair serves
/// lookups for the rest of the system lifetime, on failure nothing was
/// registered.
pub fn init(
    variant: Variant,
    regs: RegisterBlock,
    osc: Oscillator,
) -> Result<(ClockGraph, ConsumerAliasTable), InitError> {
    let profile = variant.profile();
    let graph = ClockGraph::build(profile, regs, osc)?;
    let aliases = ConsumerAliasTable::build(&graph, profile)?;
    Ok((graph, aliases))
}

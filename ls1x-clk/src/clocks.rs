//! # Clock tree nodes and the per-variant clock graph
//!
//! The graph is built bottom-up from a [VariantProfile]: the externally
//! supplied oscillator becomes the fixed-rate root, and every profile entry
//! then resolves its parent(s) against already registered clocks. The
//! finished graph is immutable in its topology; only mux selection and
//! divider enable bits change at runtime, and those live in the shared
//! register words guarded by [RegisterBlock].
//!
//! Rate queries walk the tree from the requested clock towards the root and
//! re-read the hardware on every call. The tree is at most four levels deep,
//! so freshness after an external reconfiguration is worth more than a rate
//! cache.
use heapless::{LinearMap, Vec};

use crate::profile::{ClockDecl, ParentRef, VariantProfile};
use crate::regs::{FieldError, RegisterBlock, RegisterField};
use crate::time::Hertz;

/// Upper bound of clocks in one graph, including the oscillator root.
pub const CLK_CAPACITY: usize = 16;

/// Upper bound of distinct register words referenced by one profile.
const WORD_CAPACITY: usize = 4;

/// PLL rate formula selector.
///
/// Both variants use the same node kind for their PLL, but the numeric
/// transform and the sub-field layout differ, so the formula is part of the
/// per-variant node descriptor instead of being hard-coded here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PllFormula {
    /// `rate = (12 + mult) * parent >> 1`
    Ls1b,
    /// `rate = (mult + frac) * parent >> 2`
    Ls1c,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PllSpec {
    pub formula: PllFormula,
    /// Multiplier sub-field inside the PLL frequency word.
    pub mult: RegisterField,
    /// Second sub-field added to the multiplier by [PllFormula::Ls1c].
    pub frac: Option<RegisterField>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DividerRounding {
    Truncate,
    Closest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DividerSpec {
    pub field: RegisterField,
    /// Divisor is the raw field value plus one when set, the raw value
    /// otherwise.
    pub one_based: bool,
    pub rounding: DividerRounding,
    /// Gate bit within the same register word. When clear, the divider
    /// output is off and the clock reports a rate of zero.
    pub enable_bit: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DivTableEntry {
    /// Encoded register field value.
    pub val: u32,
    /// Effective divisor for this encoding.
    pub div: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DivTableSpec {
    pub field: RegisterField,
    pub table: &'static [DivTableEntry],
    /// Pass the parent rate through unchanged for encodings missing from the
    /// table instead of failing the rate query.
    pub allow_zero: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MuxSpec {
    /// Single select bit choosing between the two parents.
    pub select: RegisterField,
    /// Select-enable override present on some variants. When this bit is
    /// clear, the mux ignores the select bit and stays on parent 0.
    pub select_enable: Option<u32>,
}

/// One clock derivation stage, as declared by a [VariantProfile].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockKind {
    FixedRate(Hertz),
    Pll(PllSpec),
    Divider(DividerSpec),
    DividerTable(DivTableSpec),
    Mux(MuxSpec),
    FixedFactor { mult: u32, div: u32 },
}

/// Handle to one clock inside a [ClockGraph].
///
/// Handles are only meaningful for the graph that returned them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clock(usize);

/// The externally supplied root oscillator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Oscillator {
    pub name: &'static str,
    pub rate: Hertz,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, thiserror::Error)]
pub enum BuildError {
    /// The profile holds more clocks or register words than the graph can
    /// store.
    #[error("graph capacity exhausted")]
    AllocationFailure,
    /// A profile entry references a parent which has not been registered
    /// yet. Profiles are ordered bottom-up, so this is an authoring bug.
    #[error("parent clock {0} is not registered")]
    UnknownParent(&'static str),
    #[error("clock name {0} is already registered")]
    DuplicateName(&'static str),
    #[error("clock {clock} declares {found} parents, its kind takes {expected}")]
    WrongParentCount {
        clock: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("clock {clock}: invalid register descriptor: {error}")]
    InvalidRegisterDescriptor {
        clock: &'static str,
        error: FieldError,
    },
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, thiserror::Error)]
pub enum RateError {
    /// A table divider read an encoding its table does not map.
    #[error("clock {clock}: divider encoding {value} is not mapped")]
    InvalidDividerEncoding { clock: &'static str, value: u32 },
    /// Detected a divisor of zero.
    #[error("clock {0}: divisor is zero")]
    DivisorZero(&'static str),
    /// The handle does not belong to this graph.
    #[error("stale clock handle")]
    InvalidHandle,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, thiserror::Error)]
pub enum ControlError {
    #[error("clock is not a mux")]
    NotAMux,
    #[error("parent index out of range")]
    BadParentIndex,
    #[error("stale clock handle")]
    InvalidHandle,
}

/// A registered clock with its parents resolved to node indices.
///
/// Parent arity is fixed per kind here, so a malformed profile cannot make
/// it past [ClockGraph::build].
#[derive(Debug)]
enum Node {
    FixedRate(Hertz),
    Pll { spec: PllSpec, parent: usize },
    Divider { spec: DividerSpec, parent: usize },
    DividerTable { spec: DivTableSpec, parent: usize },
    Mux { spec: MuxSpec, parents: [usize; 2] },
    FixedFactor { mult: u32, div: u32, parent: usize },
}

#[derive(Debug)]
struct ClockNode {
    name: &'static str,
    node: Node,
}

/// Registry of all clocks of one chip variant.
#[derive(Debug)]
pub struct ClockGraph {
    regs: RegisterBlock,
    nodes: Vec<ClockNode, CLK_CAPACITY>,
}

impl ClockGraph {
    /// Build the clock graph for one variant.
    ///
    /// The oscillator becomes the root node; the profile entries are
    /// registered in declaration order and receive the cell indices 0..n
    /// used by [Self::by_index]. Construction is all-or-nothing: on any
    /// failure the partially built set is dropped and the error is returned.
    pub fn build(
        profile: &VariantProfile,
        regs: RegisterBlock,
        osc: Oscillator,
    ) -> Result<Self, BuildError> {
        let mut nodes: Vec<ClockNode, CLK_CAPACITY> = Vec::new();
        let mut claimed: LinearMap<u32, u32, WORD_CAPACITY> = LinearMap::new();
        nodes
            .push(ClockNode {
                name: osc.name,
                node: Node::FixedRate(osc.rate),
            })
            .map_err(|_| BuildError::AllocationFailure)?;
        for decl in profile.clocks {
            let node = Self::register(&nodes, &mut claimed, decl)?;
            nodes
                .push(ClockNode {
                    name: decl.name,
                    node,
                })
                .map_err(|_| BuildError::AllocationFailure)?;
            log::debug!("{}: registered clock {}", profile.compatible, decl.name);
        }
        let graph = Self { regs, nodes };
        log::info!(
            "{}: clock driver registered, {} clocks",
            profile.compatible,
            graph.clock_count()
        );
        Ok(graph)
    }

    fn register(
        nodes: &[ClockNode],
        claimed: &mut LinearMap<u32, u32, WORD_CAPACITY>,
        decl: &ClockDecl,
    ) -> Result<Node, BuildError> {
        if nodes.iter().any(|n| n.name == decl.name) {
            return Err(BuildError::DuplicateName(decl.name));
        }
        let expected = match decl.kind {
            ClockKind::FixedRate(_) => 0,
            ClockKind::Mux(_) => 2,
            _ => 1,
        };
        if decl.parents.len() != expected {
            return Err(BuildError::WrongParentCount {
                clock: decl.name,
                expected,
                found: decl.parents.len(),
            });
        }
        let claim = |claimed: &mut LinearMap<u32, u32, WORD_CAPACITY>,
                     field: &RegisterField|
         -> Result<(), BuildError> {
            let to_build_error = |error| BuildError::InvalidRegisterDescriptor {
                clock: decl.name,
                error,
            };
            field.validate().map_err(to_build_error)?;
            let mask = field.mask();
            let current = claimed.get(&field.offset).copied().unwrap_or(0);
            if current & mask != 0 {
                return Err(to_build_error(FieldError::Overlap));
            }
            claimed
                .insert(field.offset, current | mask)
                .map_err(|_| BuildError::AllocationFailure)?;
            Ok(())
        };
        match decl.kind {
            ClockKind::Pll(spec) => {
                claim(claimed, &spec.mult)?;
                if let Some(frac) = &spec.frac {
                    claim(claimed, frac)?;
                }
            }
            ClockKind::Divider(spec) => {
                claim(claimed, &spec.field)?;
                if let Some(bit) = spec.enable_bit {
                    claim(claimed, &RegisterField::bit(spec.field.offset, bit))?;
                }
            }
            ClockKind::DividerTable(spec) => claim(claimed, &spec.field)?,
            ClockKind::Mux(spec) => {
                claim(claimed, &spec.select)?;
                if let Some(bit) = spec.select_enable {
                    claim(claimed, &RegisterField::bit(spec.select.offset, bit))?;
                }
            }
            ClockKind::FixedRate(_) | ClockKind::FixedFactor { .. } => (),
        }
        let resolve = |parent: &ParentRef| -> Result<usize, BuildError> {
            match parent {
                // The oscillator root is always node 0.
                ParentRef::Osc => Ok(0),
                ParentRef::Clock(name) => nodes
                    .iter()
                    .position(|n| n.name == *name)
                    .ok_or(BuildError::UnknownParent(name)),
            }
        };
        Ok(match decl.kind {
            ClockKind::FixedRate(rate) => Node::FixedRate(rate),
            ClockKind::Pll(spec) => Node::Pll {
                spec,
                parent: resolve(&decl.parents[0])?,
            },
            ClockKind::Divider(spec) => Node::Divider {
                spec,
                parent: resolve(&decl.parents[0])?,
            },
            ClockKind::DividerTable(spec) => Node::DividerTable {
                spec,
                parent: resolve(&decl.parents[0])?,
            },
            ClockKind::Mux(spec) => Node::Mux {
                spec,
                parents: [resolve(&decl.parents[0])?, resolve(&decl.parents[1])?],
            },
            ClockKind::FixedFactor { mult, div } => Node::FixedFactor {
                mult,
                div,
                parent: resolve(&decl.parents[0])?,
            },
        })
    }

    /// Number of cell-addressable clocks, excluding the oscillator root.
    pub fn clock_count(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Look a clock up by name. The oscillator root is included.
    pub fn by_name(&self, name: &str) -> Option<Clock> {
        self.nodes.iter().position(|n| n.name == name).map(Clock)
    }

    /// Look a clock up by its cell index, the small integer a description
    /// provider uses to address one clock of this block. Cell 0 is the first
    /// profile clock; the oscillator root is not cell-addressable.
    pub fn by_index(&self, cell: usize) -> Option<Clock> {
        let idx = cell.checked_add(1)?;
        (idx < self.nodes.len()).then_some(Clock(idx))
    }

    /// Handle to the oscillator root.
    pub fn osc(&self) -> Clock {
        Clock(0)
    }

    pub fn name(&self, clock: Clock) -> Option<&'static str> {
        self.nodes.get(clock.0).map(|n| n.name)
    }

    /// Shared register block backing this graph.
    pub fn regs(&self) -> &RegisterBlock {
        &self.regs
    }

    /// Currently effective parent of a clock.
    ///
    /// For a mux this reads the hardware selection; for every other non-root
    /// kind it is the fixed topology parent. `None` for the oscillator root
    /// and for foreign handles.
    pub fn parent(&self, clock: Clock) -> Option<Clock> {
        match &self.nodes.get(clock.0)?.node {
            Node::FixedRate(_) => None,
            Node::Pll { parent, .. }
            | Node::Divider { parent, .. }
            | Node::DividerTable { parent, .. }
            | Node::FixedFactor { parent, .. } => Some(Clock(*parent)),
            Node::Mux { spec, parents } => Some(Clock(parents[self.mux_selection(spec)])),
        }
    }

    fn mux_selection(&self, spec: &MuxSpec) -> usize {
        if let Some(bit) = spec.select_enable {
            if !self.regs.read_bit(spec.select.offset, bit) {
                return 0;
            }
        }
        (self.regs.read_field(&spec.select) != 0) as usize
    }

    /// Current rate of the clock in Hz.
    ///
    /// Re-reads the hardware on every call. A rate of zero means the clock
    /// is gated off somewhere along its parent chain; that is a valid state,
    /// not an error.
    pub fn rate(&self, clock: Clock) -> Result<Hertz, RateError> {
        if clock.0 >= self.nodes.len() {
            return Err(RateError::InvalidHandle);
        }
        self.rate_of(clock.0).map(Hertz::from_raw)
    }

    fn rate_of(&self, idx: usize) -> Result<u64, RateError> {
        let entry = &self.nodes[idx];
        let name = entry.name;
        Ok(match &entry.node {
            Node::FixedRate(rate) => rate.raw(),
            Node::Pll { spec, parent } => {
                let parent_rate = self.rate_of(*parent)?;
                let mult = u64::from(self.regs.read_field(&spec.mult));
                match spec.formula {
                    PllFormula::Ls1b => (12 + mult) * parent_rate >> 1,
                    PllFormula::Ls1c => {
                        let frac = spec
                            .frac
                            .map(|f| u64::from(self.regs.read_field(&f)))
                            .unwrap_or(0);
                        (mult + frac) * parent_rate >> 2
                    }
                }
            }
            Node::Divider { spec, parent } => {
                if let Some(bit) = spec.enable_bit {
                    if !self.regs.read_bit(spec.field.offset, bit) {
                        // Divider output is gated off.
                        return Ok(0);
                    }
                }
                let parent_rate = self.rate_of(*parent)?;
                let value = u64::from(self.regs.read_field(&spec.field));
                let divisor = if spec.one_based { value + 1 } else { value };
                if divisor == 0 {
                    return Err(RateError::DivisorZero(name));
                }
                match spec.rounding {
                    DividerRounding::Truncate => parent_rate / divisor,
                    DividerRounding::Closest => (parent_rate + divisor / 2) / divisor,
                }
            }
            Node::DividerTable { spec, parent } => {
                let parent_rate = self.rate_of(*parent)?;
                let value = self.regs.read_field(&spec.field);
                match spec.table.iter().find(|entry| entry.val == value) {
                    Some(entry) => {
                        if entry.div == 0 {
                            return Err(RateError::DivisorZero(name));
                        }
                        parent_rate / u64::from(entry.div)
                    }
                    None if spec.allow_zero => parent_rate,
                    None => {
                        return Err(RateError::InvalidDividerEncoding { clock: name, value });
                    }
                }
            }
            // Pass-through: only the selected parent is evaluated.
            Node::Mux { spec, parents } => self.rate_of(parents[self.mux_selection(spec)])?,
            Node::FixedFactor { mult, div, parent } => {
                if *div == 0 {
                    return Err(RateError::DivisorZero(name));
                }
                self.rate_of(*parent)? * u64::from(*mult) / u64::from(*div)
            }
        })
    }

    /// Gate a divider output on or off.
    ///
    /// Kinds without a gate always succeed without touching the hardware,
    /// mirroring how an enable request on an ungated clock is a no-op in the
    /// usual provider frameworks.
    pub fn set_enabled(&self, clock: Clock, enabled: bool) -> Result<(), ControlError> {
        let node = self.nodes.get(clock.0).ok_or(ControlError::InvalidHandle)?;
        if let Node::Divider { spec, .. } = &node.node {
            if let Some(bit) = spec.enable_bit {
                self.regs.set_bit(spec.field.offset, bit, enabled);
            }
        }
        Ok(())
    }

    /// Select the active parent of a mux.
    ///
    /// `parent` is the index into the mux's parent list (0 or 1). If the
    /// mux carries a select-enable override, it is set so the selection
    /// takes effect.
    pub fn set_parent(&self, clock: Clock, parent: usize) -> Result<(), ControlError> {
        let node = self.nodes.get(clock.0).ok_or(ControlError::InvalidHandle)?;
        let Node::Mux { spec, .. } = &node.node else {
            return Err(ControlError::NotAMux);
        };
        if parent > 1 {
            return Err(ControlError::BadParentIndex);
        }
        self.regs.write_field(&spec.select, parent as u32);
        if let Some(bit) = spec.select_enable {
            self.regs.set_bit(spec.select.offset, bit, true);
        }
        Ok(())
    }
}

//! Driver-level tests against a simulated register block.
//!
//! The block is two words of ordinary memory here; the driver accesses it
//! through the same volatile/locked paths it uses on hardware, with the
//! std critical-section implementation providing the lock.
use ls1x_clk::clocks::{BuildError, ClockGraph, ClockKind, Oscillator};
use ls1x_clk::profile::{ClockDecl, Ls1bClock, Ls1cClock, ParentRef, VariantProfile};
use ls1x_clk::regs::{CLK_BLOCK_WORDS, DIV_OFFSET, FREQ_OFFSET, RegisterBlock, RegisterField};
use ls1x_clk::time::Hertz;
use ls1x_clk::{ConsumerAliasTable, Variant, init};

fn regs_over(words: &mut [u32; CLK_BLOCK_WORDS]) -> RegisterBlock {
    unsafe { RegisterBlock::new(words.as_mut_ptr()) }
}

fn osc(variant: Variant) -> Oscillator {
    Oscillator {
        name: "osc_clk",
        rate: variant.default_osc_rate(),
    }
}

/// LS1B configuration: PLL mult 0x08, CPU /3, DC /4, DDR /2, all divider
/// gates open, all muxes on the divider branch.
fn ls1b_regs(words: &mut [u32; CLK_BLOCK_WORDS]) -> RegisterBlock {
    let regs = regs_over(words);
    regs.write(FREQ_OFFSET, 0x08);
    regs.write(
        DIV_OFFSET,
        (1 << 31) | (1 << 25) | (1 << 19) | (3 << 26) | (2 << 20) | (1 << 14),
    );
    regs
}

/// LS1C configuration: PLL fields 0x18/0x24, SDRAM encoding 2, CPU /4,
/// DC /6, divider gates open.
fn ls1c_regs(words: &mut [u32; CLK_BLOCK_WORDS]) -> RegisterBlock {
    let regs = regs_over(words);
    regs.write(FREQ_OFFSET, (0x24 << 16) | (0x18 << 8) | 2);
    regs.write(DIV_OFFSET, (1 << 31) | (5 << 24) | (1 << 15) | (3 << 8));
    regs
}

#[test]
fn ls1b_rates() {
    let mut words = [0u32; CLK_BLOCK_WORDS];
    let regs = ls1b_regs(&mut words);
    let (graph, _aliases) = init(Variant::Ls1b, regs, osc(Variant::Ls1b)).unwrap();
    assert_eq!(graph.clock_count(), 9);

    let rate = |name: &str| graph.rate(graph.by_name(name).unwrap()).unwrap().raw();
    // (12 + 8) * 33 MHz >> 1
    assert_eq!(rate("pll_clk"), 330_000_000);
    // One-based dividers: field 2 -> /3, field 3 -> /4, field 1 -> /2.
    assert_eq!(rate("cpu_clk_div"), 110_000_000);
    assert_eq!(rate("cpu_clk"), 110_000_000);
    assert_eq!(rate("dc_clk_div"), 82_500_000);
    assert_eq!(rate("dc_clk"), 82_500_000);
    assert_eq!(rate("ddr_clk_div"), 165_000_000);
    assert_eq!(rate("ddr_clk"), 165_000_000);
    assert_eq!(rate("ahb_clk"), 165_000_000);
    // APB is always half of AHB on the LS1B.
    assert_eq!(rate("apb_clk"), 82_500_000);
    assert_eq!(rate("osc_clk"), 33_000_000);
}

#[test]
fn ls1c_rates() {
    let mut words = [0u32; CLK_BLOCK_WORDS];
    let regs = ls1c_regs(&mut words);
    let (graph, _aliases) = init(Variant::Ls1c, regs, osc(Variant::Ls1c)).unwrap();
    assert_eq!(graph.clock_count(), 6);

    let rate = |name: &str| graph.rate(graph.by_name(name).unwrap()).unwrap().raw();
    // (0x18 + 0x24) * 24 MHz >> 2
    assert_eq!(rate("pll_clk"), 360_000_000);
    assert_eq!(rate("cpu_clk"), 90_000_000);
    assert_eq!(rate("dc_clk"), 60_000_000);
    // SDRAM encoding 2 maps to /3 off the CPU clock.
    assert_eq!(rate("ddr_clk"), 30_000_000);
    assert_eq!(rate("ahb_clk"), 30_000_000);
    // APB runs at the full AHB rate on the LS1C.
    assert_eq!(rate("apb_clk"), 30_000_000);
}

#[test]
fn cell_index_lookup_mirrors_names() {
    let mut words = [0u32; CLK_BLOCK_WORDS];
    let regs = ls1b_regs(&mut words);
    let (graph, _aliases) = init(Variant::Ls1b, regs, osc(Variant::Ls1b)).unwrap();
    for (cell, name) in [
        (Ls1bClock::Pll as usize, "pll_clk"),
        (Ls1bClock::CpuDiv as usize, "cpu_clk_div"),
        (Ls1bClock::Cpu as usize, "cpu_clk"),
        (Ls1bClock::Ahb as usize, "ahb_clk"),
        (Ls1bClock::Apb as usize, "apb_clk"),
    ] {
        let clock = graph.by_index(cell).unwrap();
        assert_eq!(graph.name(clock), Some(name));
        assert_eq!(graph.by_name(name), Some(clock));
    }
    assert!(graph.by_index(9).is_none());

    let mut words = [0u32; CLK_BLOCK_WORDS];
    let regs = ls1c_regs(&mut words);
    let (graph, _aliases) = init(Variant::Ls1c, regs, osc(Variant::Ls1c)).unwrap();
    let ddr = graph.by_index(Ls1cClock::Ddr.into()).unwrap();
    assert_eq!(graph.name(ddr), Some("ddr_clk"));
    assert!(graph.by_index(6).is_none());
}

#[test]
fn alias_resolution() {
    for variant in [Variant::Ls1b, Variant::Ls1c] {
        let mut words = [0u32; CLK_BLOCK_WORDS];
        let regs = match variant {
            Variant::Ls1b => ls1b_regs(&mut words),
            Variant::Ls1c => ls1c_regs(&mut words),
        };
        let (graph, aliases) = init(variant, regs, osc(variant)).unwrap();
        // Every declared alias resolves to a clock that exists in the graph.
        for alias in variant.profile().aliases {
            let clock = aliases.lookup(alias.consumer, alias.con_id).unwrap();
            assert_eq!(Some(clock), graph.by_name(alias.clock));
        }
        let ahb = graph.by_name("ahb_clk").unwrap();
        assert_eq!(aliases.lookup("ls1x-dma", None), Some(ahb));
        assert_eq!(aliases.lookup("stmmaceth", None), Some(ahb));
        let apb = graph.by_name("apb_clk").unwrap();
        assert_eq!(aliases.lookup("serial8250", None), Some(apb));
        assert_eq!(aliases.lookup("ls1x-gpu", None), None);
    }
}

#[test]
fn mux_toggle_only_affects_descendants() {
    let mut words = [0u32; CLK_BLOCK_WORDS];
    let regs = ls1b_regs(&mut words);
    let (graph, _aliases) = init(Variant::Ls1b, regs, osc(Variant::Ls1b)).unwrap();
    let rate = |name: &str| graph.rate(graph.by_name(name).unwrap()).unwrap().raw();
    let cpu = graph.by_name("cpu_clk").unwrap();

    graph.set_parent(cpu, 1).unwrap();
    // The CPU mux now bypasses to the oscillator.
    assert_eq!(rate("cpu_clk"), 33_000_000);
    assert_eq!(graph.parent(cpu), Some(graph.osc()));
    // Clocks whose fields share the same register word are untouched.
    assert_eq!(rate("cpu_clk_div"), 110_000_000);
    assert_eq!(rate("dc_clk"), 82_500_000);
    assert_eq!(rate("ddr_clk"), 165_000_000);
    assert_eq!(rate("ahb_clk"), 165_000_000);
    assert_eq!(rate("apb_clk"), 82_500_000);

    graph.set_parent(cpu, 0).unwrap();
    assert_eq!(rate("cpu_clk"), 110_000_000);
}

#[test]
fn malformed_profile_builds_nothing() {
    static BROKEN: VariantProfile = VariantProfile {
        compatible: "test-clock",
        clocks: &[
            ClockDecl {
                name: "child_clk",
                // Parent is declared below, violating the bottom-up order.
                parents: &[ParentRef::Clock("parent_clk")],
                kind: ClockKind::FixedFactor { mult: 1, div: 2 },
            },
            ClockDecl {
                name: "parent_clk",
                parents: &[ParentRef::Osc],
                kind: ClockKind::FixedFactor { mult: 1, div: 1 },
            },
        ],
        aliases: &[],
    };
    let mut words = [0u32; CLK_BLOCK_WORDS];
    let result = ClockGraph::build(
        &BROKEN,
        regs_over(&mut words),
        Oscillator {
            name: "osc_clk",
            rate: Hertz::from_raw(24_000_000),
        },
    );
    assert_eq!(result.unwrap_err(), BuildError::UnknownParent("parent_clk"));
    // The register block is untouched and can back a fresh, valid build.
    assert_eq!(words, [0u32; CLK_BLOCK_WORDS]);
    let regs = ls1c_regs(&mut words);
    assert!(ClockGraph::build(Variant::Ls1c.profile(), regs, osc(Variant::Ls1c)).is_ok());
}

#[test]
fn alias_table_capacity_is_sufficient() {
    for variant in [Variant::Ls1b, Variant::Ls1c] {
        let mut words = [0u32; CLK_BLOCK_WORDS];
        let regs = regs_over(&mut words);
        let graph = ClockGraph::build(variant.profile(), regs, osc(variant)).unwrap();
        let table = ConsumerAliasTable::build(&graph, variant.profile()).unwrap();
        assert_eq!(table.len(), variant.profile().aliases.len());
        assert!(!table.is_empty());
    }
}

fn xorshift(mut x: u32) -> u32 {
    x ^= x << 13;
    x ^= x >> 17;
    x ^= x << 5;
    x
}

#[test]
fn concurrent_field_writes_do_not_lose_updates() {
    const ROUNDS: usize = 10_000;
    let mut words = [0u32; CLK_BLOCK_WORDS];
    let regs = regs_over(&mut words);
    let lo = RegisterField::new(DIV_OFFSET, 0, 8);
    let hi = RegisterField::new(DIV_OFFSET, 16, 8);

    let (last_lo, last_hi) = std::thread::scope(|s| {
        let regs = &regs;
        let writer = |field: RegisterField, seed: u32| {
            move || {
                let mut state = seed;
                let mut last = 0;
                for _ in 0..ROUNDS {
                    state = xorshift(state);
                    last = state & 0xff;
                    regs.write_field(&field, last);
                }
                last
            }
        };
        let a = s.spawn(writer(lo, 0x1234_5678));
        let b = s.spawn(writer(hi, 0x8765_4321));
        (a.join().unwrap(), b.join().unwrap())
    });

    // Neither writer lost the other's final update.
    assert_eq!(regs.read_field(&lo), last_lo);
    assert_eq!(regs.read_field(&hi), last_hi);
    assert_eq!(regs.read(FREQ_OFFSET), 0);
}

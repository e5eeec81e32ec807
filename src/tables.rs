use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};

use crate::{core::aggregate::Results, quantity::cost::Cost};

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED).apply_modifier(modifiers::UTF8_ROUND_CORNERS);
    table.enforce_styling();
    table
}

fn percentage(value: Option<f64>) -> Cell {
    value.map_or_else(
        || Cell::new("n/a").add_attribute(Attribute::Dim),
        |value| Cell::new(format!("{value:.1} %")),
    )
    .set_alignment(CellAlignment::Right)
}

fn savings(value: Cost) -> Cell {
    Cell::new(value)
        .set_alignment(CellAlignment::Right)
        .fg(if value >= Cost::ZERO { Color::Green } else { Color::Red })
}

pub fn build_participants_table(results: &Results) -> Table {
    let mut table = new_table();
    table.set_header(vec![
        "Participant",
        "Consumption",
        "Allocated",
        "Self-consumed",
        "From storage",
        "Grid import",
        "Compensated",
        "SCR",
        "SSR",
        "Bill",
        "Baseline",
        "Savings",
    ]);
    for participant in &results.participants {
        let totals = &participant.totals;
        table.add_row(vec![
            Cell::new(&participant.name),
            Cell::new(totals.consumption).set_alignment(CellAlignment::Right),
            Cell::new(totals.allocated).set_alignment(CellAlignment::Right),
            Cell::new(totals.autoconsumption).set_alignment(CellAlignment::Right),
            Cell::new(totals.storage_delivered).set_alignment(CellAlignment::Right),
            Cell::new(totals.grid_import).set_alignment(CellAlignment::Right),
            Cell::new(totals.surplus_compensated).set_alignment(CellAlignment::Right),
            percentage(participant.self_consumption_ratio),
            percentage(participant.self_sufficiency_ratio),
            Cell::new(participant.bill).set_alignment(CellAlignment::Right),
            Cell::new(participant.baseline_bill)
                .set_alignment(CellAlignment::Right)
                .add_attribute(Attribute::Dim),
            savings(participant.savings),
        ]);
    }
    table
}

pub fn build_assets_table(results: &Results) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Asset", "Kind", "Energy", "Capacity factor", "PR", "Cycles", "Mean SoC", "Degradation"]);
    for asset in &results.generation_assets {
        table.add_row(vec![
            Cell::new(&asset.name),
            Cell::new(asset.technology),
            Cell::new(asset.generated).set_alignment(CellAlignment::Right),
            percentage(Some(asset.capacity_factor)),
            percentage(asset.performance_ratio),
            Cell::new(""),
            Cell::new(""),
            Cell::new(""),
        ]);
    }
    for asset in &results.storage_assets {
        table.add_row(vec![
            Cell::new(&asset.name),
            Cell::new("storage"),
            Cell::new(asset.discharged).set_alignment(CellAlignment::Right),
            Cell::new(""),
            Cell::new(""),
            Cell::new(format!("{:.1}", asset.equivalent_cycles)).set_alignment(CellAlignment::Right),
            percentage(Some(asset.mean_state_of_charge)),
            percentage(Some(asset.degradation)).fg(if asset.degradation >= 20.0 {
                Color::Red
            } else {
                Color::Reset
            }),
        ]);
    }
    table
}

pub fn build_global_table(results: &Results) -> Table {
    let global = &results.global;
    let mut table = new_table();
    table.set_header(vec!["Community", ""]);
    table.add_row(vec![Cell::new("Generated"), Cell::new(global.generated)]);
    table.add_row(vec![Cell::new("Consumption"), Cell::new(global.totals.consumption)]);
    table.add_row(vec![Cell::new("Locally covered"), Cell::new(global.totals.locally_covered())]);
    table.add_row(vec![Cell::new("Self-consumption ratio"), percentage(global.self_consumption_ratio)]);
    table.add_row(vec![Cell::new("Self-sufficiency ratio"), percentage(global.self_sufficiency_ratio)]);
    table.add_row(vec![Cell::new("Bill"), Cell::new(global.bill)]);
    table.add_row(vec![Cell::new("Baseline bill"), Cell::new(global.baseline_bill)]);
    table.add_row(vec![Cell::new("Savings"), savings(global.savings)]);
    table.add_row(vec![Cell::new("Annual savings"), savings(global.annual_savings)]);
    table.add_row(vec![Cell::new("Investment"), Cell::new(global.investment)]);
    table.add_row(vec![
        Cell::new("Payback"),
        global.payback_period.map_or_else(
            || Cell::new("never").fg(Color::Red),
            |years| Cell::new(format!("{years:.1} years")),
        ),
    ]);
    table.add_row(vec![Cell::new("Return on investment"), percentage(global.return_on_investment)]);
    table.add_row(vec![Cell::new("CO₂ avoided"), Cell::new(format!("{:.0} kg", global.co2_avoided))]);
    table
}

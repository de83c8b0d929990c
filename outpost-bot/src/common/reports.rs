use colored::Colorize;

use crate::scheduler::{CycleSummary, EntityReport};

pub fn print_cycle_summary(cycle: u64, summary: &CycleSummary) {
    println!();
    println!("{}", format!("📊 Cycle {cycle} Summary").bright_cyan().bold());
    println!("{}", "======================".cyan());
    println!("Villages: {}", summary.villages.len());
    println!("Dispatched: {}", summary.dispatched().to_string().green());
    println!("Failures: {}", summary.failures().to_string().red());
    if summary.oases_discovered > 0 {
        println!("New oases: {}", summary.oases_discovered);
    }
    println!();

    for report in &summary.villages {
        println!("{}", village_line(report));
    }
}

fn village_line(report: &EntityReport) -> String {
    let status = if report.failures == 0 {
        "✅".normal()
    } else {
        "⚠️ ".yellow()
    };
    let mut line = format!(
        "{status} {}  sent {} · skipped {} · denylisted {}",
        report.village.bold(),
        report.dispatched,
        report.skipped,
        report.denylisted
    );
    if report.failures > 0 {
        line.push_str(&format!(" · {}", format!("{} failed", report.failures).red()));
    }
    if report.attacks_detected > 0 {
        line.push_str(&format!(
            " · {} attack alerts, {} evacuations",
            report.attacks_detected, report.emergency_transfers
        ));
    }
    if report.festival_active {
        line.push_str(" · 🎉");
    }
    line
}

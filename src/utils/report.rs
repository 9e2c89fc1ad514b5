//! Text builders for the list, report, dashboard and search views.

use chrono::Datelike;
use std::collections::BTreeMap;
use std::fmt::Write;

use super::format::{format_amount, format_date, format_month};
use crate::search::SearchHit;
use crate::storage::{Expense, PETROL_CATEGORY};

/// Number of expenses shown under "Recent Expenses".
const DASHBOARD_RECENT: usize = 5;

/// Expenses grouped by category (sorted by name) with a subtotal each.
pub fn build_expense_list(expenses: &[Expense]) -> String {
    if expenses.is_empty() {
        return "No expenses found.".to_string();
    }

    let mut by_category: BTreeMap<String, Vec<&Expense>> = BTreeMap::new();
    for expense in expenses {
        by_category
            .entry(expense.category.label())
            .or_default()
            .push(expense);
    }

    let mut text = String::from("Your expenses:\n\n");
    for (category, items) in &by_category {
        let _ = writeln!(text, "📊 {category}:");
        for expense in items {
            let _ = writeln!(
                text,
                "• {}: {}",
                format_date(&expense.timestamp),
                format_amount(expense.total_price)
            );
        }
        let total: f64 = items.iter().map(|e| e.total_price).sum();
        let _ = writeln!(text, "Total: {}\n", format_amount(total));
    }

    text
}

pub fn build_report(expenses: &[Expense]) -> String {
    if expenses.is_empty() {
        return "No expenses found to generate report.".to_string();
    }

    let total: f64 = expenses.iter().map(|e| e.total_price).sum();

    let mut by_category: BTreeMap<String, f64> = BTreeMap::new();
    // Keyed by (year, month) so months print in calendar order
    let mut by_month: BTreeMap<(i32, u32), (String, f64)> = BTreeMap::new();
    for expense in expenses {
        *by_category.entry(expense.category.label()).or_default() += expense.total_price;

        let key = (expense.timestamp.year(), expense.timestamp.month());
        let entry = by_month
            .entry(key)
            .or_insert_with(|| (format_month(&expense.timestamp), 0.0));
        entry.1 += expense.total_price;
    }

    let mut text = String::from("📊 Expense Report\n\n");
    let _ = writeln!(text, "💰 Total Expenses: {}\n", format_amount(total));

    text.push_str("📈 Category Breakdown:\n");
    for (category, amount) in &by_category {
        let percentage = if total > 0.0 {
            amount / total * 100.0
        } else {
            0.0
        };
        let _ = writeln!(
            text,
            "• {}: {} ({:.1}%)",
            category,
            format_amount(*amount),
            percentage
        );
    }
    text.push('\n');

    text.push_str("📅 Monthly Breakdown:\n");
    for (month, amount) in by_month.values() {
        let _ = writeln!(text, "• {}: {}", month, format_amount(*amount));
    }

    text
}

/// Totals, fuel efficiency and the most recent expenses.
///
/// Efficiency is the distance between the lowest and highest petrol odometer
/// readings per ₹100 of petrol spend, shown only when that distance is positive.
pub fn build_dashboard(expenses: &[Expense]) -> String {
    if expenses.is_empty() {
        return "No expenses found to show dashboard.".to_string();
    }

    let mut recent: Vec<&Expense> = expenses.iter().collect();
    recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let total: f64 = expenses.iter().map(|e| e.total_price).sum();
    let petrol: Vec<&Expense> = expenses
        .iter()
        .filter(|e| e.category.name == PETROL_CATEGORY)
        .collect();
    let fuel_total: f64 = petrol.iter().map(|e| e.total_price).sum();

    let readings: Vec<f64> = petrol
        .iter()
        .map(|e| e.odometer)
        .filter(|o| *o > 0.0)
        .collect();
    let distance = match (
        readings.iter().cloned().reduce(f64::min),
        readings.iter().cloned().reduce(f64::max),
    ) {
        (Some(low), Some(high)) => high - low,
        _ => 0.0,
    };

    let mut text = String::from("📱 Expense Dashboard\n\n");
    text.push_str("📊 Overall Metrics:\n");
    let _ = writeln!(text, "• Total Expenses: {}", format_amount(total));
    let _ = writeln!(text, "• Total Fuel Expenses: {}", format_amount(fuel_total));
    if distance > 0.0 && fuel_total > 0.0 {
        let _ = writeln!(
            text,
            "• Average Fuel Efficiency: {:.1} km/₹100",
            distance / (fuel_total / 100.0)
        );
    }
    text.push('\n');

    text.push_str("🕒 Recent Expenses:\n");
    for expense in recent.into_iter().take(DASHBOARD_RECENT) {
        let _ = writeln!(
            text,
            "• {} - {}: {}",
            format_date(&expense.timestamp),
            expense.category.label(),
            format_amount(expense.total_price)
        );
    }

    text
}

pub fn build_search_results(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!(
            "No expenses found matching: {:?}\n\nTry a different search term or be more specific.",
            query
        );
    }

    let mut text = format!("🔍 Search Results for: {:?}\n\n", query);
    let _ = writeln!(text, "Found {} matching expenses:\n", hits.len());
    for (i, hit) in hits.iter().enumerate() {
        let expense = &hit.expense;
        let _ = writeln!(
            text,
            "{}. {} - {}: {}",
            i + 1,
            format_date(&expense.timestamp),
            expense.category.label(),
            format_amount(expense.total_price)
        );
        if !expense.notes.is_empty() {
            let _ = writeln!(text, "   Notes: {}", expense.notes);
        }
        text.push('\n');
    }

    text
}

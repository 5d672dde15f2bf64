use callscope_core::model::{NormalizedCall, QueryValue};
use callscope_core::query::{CallsResponse, StatusResponse};
use callscope_core::summary::Summary;
use chrono::SecondsFormat;
use owo_colors::OwoColorize;

use crate::protocol::ClearResponse;

pub fn print_summary_human(v: &Summary, color: bool) {
    for call in &v.calls {
        print_call_line(call, color);
    }
    for (method, count) in &v.methods {
        println!("method={method} count={count}");
    }
    println!(
        "-- {} calls, {} errors, {} total --",
        v.call_count(),
        v.error_count,
        millis(v.total_time)
    );
}

pub fn print_calls_human(v: &CallsResponse, color: bool) {
    for call in &v.calls {
        print_call_line(call, color);
    }
    println!(
        "-- {} matches ({} returned), {} errors, {} total --",
        v.total_matches,
        v.returned,
        v.error_count,
        millis(v.total_time)
    );
}

pub fn print_call_human(call: &NormalizedCall, color: bool) {
    println!(
        "CALL {} {} {} origin={}",
        call.id,
        call.request.method,
        call.request.url(),
        serde_json::to_value(call.origin)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default()
    );
    println!(
        "status={} reason=\"{}\" error={} cached={} total={}",
        status_label(call, color),
        call.response.reason,
        call.is_error,
        call.cached,
        millis(call.timing.total)
    );

    for (name, value) in &call.request.query {
        let rendered = match value {
            QueryValue::One(v) => v.clone(),
            QueryValue::Many(vs) => vs.join(","),
        };
        println!("query {name}={rendered}");
    }
    for (name, values) in call.request.headers.iter() {
        println!("> {name}: {}", values.join(", "));
    }
    if let Some(body) = call.request.body.as_deref().filter(|b| !b.is_empty()) {
        println!("> body {body}");
    }
    for (name, values) in call.response.headers.iter() {
        println!("< {name}: {}", values.join(", "));
    }
    if !call.response.body.is_empty() {
        println!("< body {}", call.response.body);
    }

    if !call.timing.phases.is_empty() {
        println!("phases:");
        for (kind, phase) in call.timing.iter() {
            println!(
                "  {:<12} {:>10} {:>6.1}% {}",
                kind.name(),
                millis(phase.duration),
                phase.percentage,
                bar(phase.start_percentage, phase.percentage)
            );
        }
    }

    if !call.trace.is_empty() {
        println!("trace:");
        for frame in &call.trace {
            let location = match frame.line {
                Some(line) if !frame.file.is_empty() => format!("{}:{line}", frame.file),
                _ => frame.file.clone(),
            };
            match &frame.class {
                Some(class) => println!("  {class}::{} {location}", frame.function),
                None => println!("  {} {location}", frame.function),
            }
        }
    }
}

pub fn print_status_human(v: &StatusResponse) {
    println!("enabled={}", v.enabled);
    println!("capture_stack={}", v.capture_stack);
    println!("buffered={} capacity={}", v.buffered, v.capacity);
}

pub fn print_clear_human(v: &ClearResponse) {
    println!("cleared={}", v.cleared);
}

fn print_call_line(call: &NormalizedCall, color: bool) {
    let cached = if call.cached { " cached" } else { "" };
    println!(
        "{} {} {} {} {}{cached} id={}",
        call.recorded_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        call.request.method,
        status_label(call, color),
        call.request.url(),
        millis(call.timing.total),
        call.id
    );
}

fn status_label(call: &NormalizedCall, color: bool) -> String {
    let text = call.response.status.to_string();
    if !color {
        return text;
    }
    if call.is_error {
        text.red().to_string()
    } else if call.cached {
        text.cyan().to_string()
    } else {
        text.green().to_string()
    }
}

fn millis(seconds: f64) -> String {
    format!("{:.1}ms", seconds * 1000.0)
}

// Twenty-column bar placed at the phase start.
fn bar(start_percentage: f64, percentage: f64) -> String {
    let offset = (start_percentage / 5.0).round().clamp(0.0, 20.0) as usize;
    let width = (percentage / 5.0).round().clamp(1.0, 20.0) as usize;
    format!("{}{}", " ".repeat(offset), "#".repeat(width.min(20 - offset.min(19))))
}

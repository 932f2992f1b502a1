use std::path::Path;

use pcsize_core::{split_envelope, CoreError, DecodedLedgers, PcsizeConfig};
use pcsize_protocol::wire::read_envelope_file;
use pcsize_protocol::{DependencyKind, SessionHandle};
use serde::Serialize;

// ── Check result types ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Fail,
    Warn,
    Skip,
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.to_string(),
            details: Vec::new(),
        }
    }

    fn pass(name: &str, message: &str) -> Self {
        Self::new(name, CheckStatus::Pass, message)
    }

    fn fail(name: &str, message: &str) -> Self {
        Self::new(name, CheckStatus::Fail, message)
    }

    fn warn(name: &str, message: &str) -> Self {
        Self::new(name, CheckStatus::Warn, message)
    }

    fn skip(name: &str, message: &str) -> Self {
        Self::new(name, CheckStatus::Skip, message)
    }

    fn detail(mut self, detail: &str) -> Self {
        self.details.push(detail.to_string());
        self
    }
}

// ── Main entry point ────────────────────────────────────────────────────────

/// Run every check against one envelope file. Returns `true` if any check
/// failed.
pub fn run_verify(envelope_path: &Path, config_path: &str, json: bool) -> anyhow::Result<bool> {
    let results = collect_checks(envelope_path, config_path);

    if json {
        print_results_json(&results)?;
    } else {
        print_results_pretty(&results);
    }

    Ok(results.iter().any(|r| r.status == CheckStatus::Fail))
}

pub fn collect_checks(envelope_path: &Path, config_path: &str) -> Vec<CheckResult> {
    let mut results: Vec<CheckResult> = Vec::new();

    // Check 1: Configuration
    let config = check_config(config_path, &mut results);

    // Check 2: Envelope decodes
    let Some(ledgers) = check_envelope(envelope_path, &mut results) else {
        for name in ["Reference counts", "Dependency references", "Reservation"] {
            results.push(CheckResult::skip(name, "Envelope did not decode"));
        }
        return results;
    };

    // Check 3: Counter invariants
    check_ref_counts(&ledgers, &mut results);

    // Check 4: Dependency descriptions point at recorded objects
    check_dependency_references(&ledgers, &mut results);

    // Check 5: Reservation covers the observed peaks
    check_reservation(&ledgers, &config, &mut results);

    results
}

// ── Check 1: Configuration ──────────────────────────────────────────────────

fn check_config(config_path: &str, results: &mut Vec<CheckResult>) -> PcsizeConfig {
    if !Path::new(config_path).exists() {
        results.push(
            CheckResult::warn(
                "Configuration",
                &format!("Config file not found: {}", config_path),
            )
            .detail("Using default sizing configuration"),
        );
        return PcsizeConfig::default();
    }

    match PcsizeConfig::load(config_path) {
        Ok(config) => {
            results.push(
                CheckResult::pass("Configuration", &format!("Loaded {}", config_path))
                    .detail(&format!(
                        "Pool entry alignment: {} bytes",
                        config.sizing.pool_entry_alignment
                    ))
                    .detail(&format!(
                        "Minimum pool entry: {} bytes",
                        config.sizing.min_pool_entry_size
                    ))
                    .detail(&format!("Headroom: {}%", config.sizing.headroom_percent)),
            );
            config
        }
        Err(e) => {
            results.push(
                CheckResult::fail("Configuration", &format!("Invalid config: {}", e))
                    .detail("Falling back to defaults for the remaining checks"),
            );
            PcsizeConfig::default()
        }
    }
}

// ── Check 2: Envelope ───────────────────────────────────────────────────────

fn check_envelope(path: &Path, results: &mut Vec<CheckResult>) -> Option<DecodedLedgers> {
    match read_envelope_file(path) {
        Ok(envelope) => {
            let ledgers = split_envelope(envelope);
            let mut result =
                CheckResult::pass("Envelope", &format!("Decoded {}", path.display()));
            result = result.detail(&format!("Pipelines: {}", ledgers.pipelines.len()));
            for kind in DependencyKind::ALL {
                result = result.detail(&format!("{}: {}", kind, ledgers.dependencies.len(kind)));
            }
            result = result.detail(&format!("Command pools: {}", ledgers.pools.len()));
            results.push(result);
            Some(ledgers)
        }
        Err(e) => {
            results.push(CheckResult::fail(
                "Envelope",
                &format!("Cannot decode {}: {}", path.display(), e),
            ));
            None
        }
    }
}

// ── Check 3: Reference counts ───────────────────────────────────────────────

fn check_ref_counts(ledgers: &DecodedLedgers, results: &mut Vec<CheckResult>) {
    let mut problems = Vec::new();

    for p in ledgers.pipelines.iter() {
        if p.peak_ref_count < p.current_ref_count || p.total_ref_count < p.peak_ref_count {
            problems.push(format!(
                "pipeline {}: current {}, peak {}, total {}",
                p.identifier, p.current_ref_count, p.peak_ref_count, p.total_ref_count
            ));
        }
    }
    for pool in ledgers.pools.iter() {
        if pool.peak_pool_allocated < pool.current_pool_allocated
            || pool.peak_pool_reserved < pool.current_pool_reserved
            || pool.peak_buffer_allocated < pool.current_buffer_allocated
        {
            problems.push(format!("command pool {}: peak below current", pool.pool_id));
        }
    }

    if problems.is_empty() {
        results.push(CheckResult::pass(
            "Reference counts",
            "Peaks cover live counts everywhere",
        ));
    } else {
        let mut result = CheckResult::fail(
            "Reference counts",
            &format!("{} record(s) break the peak invariant", problems.len()),
        );
        for problem in &problems {
            result = result.detail(problem);
        }
        results.push(result);
    }
}

// ── Check 4: Dependency references ──────────────────────────────────────────

fn check_dependency_references(ledgers: &DecodedLedgers, results: &mut Vec<CheckResult>) {
    let maps = ledgers.dependencies.maps();
    let mut dangling = Vec::new();
    let mut unparsable = Vec::new();

    for (handle, description) in maps.map(DependencyKind::PipelineLayout) {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(description) else {
            unparsable.push(format!("pipeline layout {}", handle));
            continue;
        };
        for set_layout in handles_in(value.get("setLayouts")) {
            if maps.get(DependencyKind::DescriptorSetLayout, SessionHandle(set_layout)).is_none() {
                dangling.push(format!(
                    "pipeline layout {} names missing descriptor set layout #{}",
                    handle, set_layout
                ));
            }
        }
    }

    for (handle, description) in maps.map(DependencyKind::DescriptorSetLayout) {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(description) else {
            unparsable.push(format!("descriptor set layout {}", handle));
            continue;
        };
        let bindings = value.get("bindings").and_then(|b| b.as_array());
        for binding in bindings.into_iter().flatten() {
            for sampler in handles_in(binding.get("immutableSamplers")) {
                if maps.get(DependencyKind::Sampler, SessionHandle(sampler)).is_none() {
                    dangling.push(format!(
                        "descriptor set layout {} names missing sampler #{}",
                        handle, sampler
                    ));
                }
            }
        }
    }

    if !unparsable.is_empty() {
        let mut result = CheckResult::fail(
            "Dependency references",
            "Some descriptions are not valid JSON",
        );
        for item in &unparsable {
            result = result.detail(item);
        }
        results.push(result);
    } else if !dangling.is_empty() {
        let mut result = CheckResult::warn(
            "Dependency references",
            &format!("{} reference(s) to objects not in the envelope", dangling.len()),
        );
        for item in &dangling {
            result = result.detail(item);
        }
        results.push(result);
    } else {
        results.push(CheckResult::pass(
            "Dependency references",
            "Every referenced object is recorded",
        ));
    }
}

fn handles_in(array: Option<&serde_json::Value>) -> impl Iterator<Item = u64> + '_ {
    array
        .and_then(|a| a.as_array())
        .into_iter()
        .flatten()
        .filter_map(|v| v.as_u64())
        .filter(|h| *h != 0)
}

// ── Check 5: Reservation ────────────────────────────────────────────────────

fn check_reservation(
    ledgers: &DecodedLedgers,
    config: &PcsizeConfig,
    results: &mut Vec<CheckResult>,
) {
    match ledgers.verify(&config.sizing) {
        Ok(()) => {
            let required = ledgers.required_reservation(&config.sizing);
            let mut result = CheckResult::pass(
                "Reservation",
                "Reservation covers every observed peak",
            );
            if ledgers.reservation == required {
                result = result.detail("Matches a fresh sizing under this configuration");
            } else {
                result = result.detail("Differs from a fresh sizing (headroom or other config)");
            }
            results.push(result);
        }
        Err(CoreError::Undersized {
            field,
            reserved,
            required,
        }) => {
            results.push(
                CheckResult::fail("Reservation", &format!("{} is under-sized", field))
                    .detail(&format!("Reserved: {}", reserved))
                    .detail(&format!("Required: {}", required))
                    .detail("Re-run `pcsize size` to recompute"),
            );
        }
        Err(e) => {
            results.push(CheckResult::fail(
                "Reservation",
                &format!("Cannot check reservation: {}", e),
            ));
        }
    }
}

// ── Output formatters ───────────────────────────────────────────────────────

fn print_results_pretty(results: &[CheckResult]) {
    println!();
    println!("Pipeline Cache Envelope Verification");
    println!("====================================");
    println!();

    let mut pass_count = 0u32;
    let mut fail_count = 0u32;
    let mut warn_count = 0u32;

    for result in results {
        let (icon, color_start, color_end) = match result.status {
            CheckStatus::Pass => {
                pass_count += 1;
                ("[PASS]", "\x1b[32m", "\x1b[0m")
            }
            CheckStatus::Fail => {
                fail_count += 1;
                ("[FAIL]", "\x1b[31m", "\x1b[0m")
            }
            CheckStatus::Warn => {
                warn_count += 1;
                ("[WARN]", "\x1b[33m", "\x1b[0m")
            }
            CheckStatus::Skip => ("[SKIP]", "\x1b[90m", "\x1b[0m"),
        };

        println!(
            "  {}{}{} {} - {}",
            color_start, icon, color_end, result.name, result.message
        );

        for detail in &result.details {
            println!("         {}", detail);
        }
        println!();
    }

    println!("------------------------------------");
    println!(
        "  {} passed, {} failed, {} warnings",
        pass_count, fail_count, warn_count
    );
    println!();
}

fn print_results_json(results: &[CheckResult]) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(results)?);
    Ok(())
}

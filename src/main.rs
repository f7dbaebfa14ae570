//! royalty-settlement CLI
//!
//! Run settlement queries and correction jobs against a JSON store file.
//!
//! # Usage
//!
//! ```bash
//! # Settlement figures for one merchant
//! royalty-settlement act --store store.json --merchant m-1 --from 2021-01-01 --to 2021-01-31
//!
//! # Repair stored period boundaries (writes the store back)
//! royalty-settlement normalize-periods --store store.json
//!
//! # Backfill B2B VAT
//! royalty-settlement backfill-vat --store store.json --config settlement.json
//!
//! # Generate a random store for testing
//! royalty-settlement generate --merchants 10 --reports 8 --output store.json
//! ```

use log::error;
use royalty_settlement::config::SettlementConfig;
use royalty_settlement::core::currency::MoneyValue;
use royalty_settlement::core::rounding::{MoneyRounder, RoundingPolicy};
use royalty_settlement::jobs::period_normalizer::PeriodNormalizer;
use royalty_settlement::jobs::vat_backfill::{VatBackfillJob, VatBackfillScope};
use royalty_settlement::repository::memory::{InMemoryStore, ReportSummaryAggregator};
use royalty_settlement::repository::MerchantRepository;
use royalty_settlement::settlement::act::{
    ActOfCompletionCalculator, ActOfCompletionRequest, ResponseStatus,
};
use royalty_settlement::simulation::fixtures::{generate_random_store, FixtureConfig};
use std::collections::HashMap;
use std::fs;
use std::process;
use std::sync::Arc;

fn print_usage() {
    eprintln!(
        r#"royalty-settlement — merchant settlement figures and correction jobs

USAGE:
    royalty-settlement <COMMAND> [OPTIONS]

COMMANDS:
    act                 Compute an act of completion for a merchant
    normalize-periods   Repair report period boundaries and payout periods
    backfill-vat        Recompute B2B VAT on reports and payouts
    generate            Generate a random store (for testing)
    help                Show this message

OPTIONS (act):
    --store <FILE>      Path to JSON store
    --merchant <ID>     Merchant id
    --from <DATE>       First day, YYYY-MM-DD
    --to <DATE>         Last day, YYYY-MM-DD
    --format <FORMAT>   Output format: text (default) or json

OPTIONS (normalize-periods, backfill-vat):
    --store <FILE>      Path to JSON store (rewritten in place)
    --output <FILE>     Write the corrected store here instead
    --dry-run           normalize-periods only: report changes, write nothing
    --payouts-only      backfill-vat only: skip royalty reports
    --royalties-only    backfill-vat only: skip payouts

COMMON OPTIONS:
    --config <FILE>     Path to JSON settlement config (defaults otherwise)

OPTIONS (generate):
    --merchants <N>     Number of merchants (default: 10)
    --reports <N>       Weekly reports per merchant (default: 8)
    --per-payout <N>    Reports folded into each payout (default: 4)
    --config <FILE>     Lay report weeks out in this config's timezone
    --output <FILE>     Write to file instead of stdout

EXAMPLES:
    royalty-settlement generate --merchants 3 --output store.json
    royalty-settlement normalize-periods --store store.json --dry-run
    royalty-settlement act --store store.json --merchant <ID> --from 2020-06-01 --to 2020-06-30"#
    );
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

/// Parse `--key value` pairs and bare `--flag`s.
fn parse_options(args: &[String], valued: &[&str], flags: &[&str]) -> HashMap<String, String> {
    let mut options = HashMap::new();
    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        if valued.contains(&arg) {
            i += 1;
            let value = args
                .get(i)
                .cloned()
                .unwrap_or_else(|| fail(format!("{} requires a value", arg)));
            options.insert(arg.to_string(), value);
        } else if flags.contains(&arg) {
            options.insert(arg.to_string(), String::new());
        } else {
            fail(format!("Unknown option: {}", arg));
        }
        i += 1;
    }
    options
}

fn required<'a>(options: &'a HashMap<String, String>, key: &str) -> &'a str {
    options
        .get(key)
        .map(String::as_str)
        .unwrap_or_else(|| fail(format!("{} is required", key)))
}

fn load_config(options: &HashMap<String, String>) -> SettlementConfig {
    match options.get("--config") {
        Some(path) => SettlementConfig::from_file(path)
            .unwrap_or_else(|e| fail(format!("config '{}': {}", path, e))),
        None => SettlementConfig::default(),
    }
}

fn load_store(path: &str) -> InMemoryStore {
    InMemoryStore::load(path).unwrap_or_else(|e| fail(format!("store '{}': {}", path, e)))
}

fn save_store(store: &InMemoryStore, options: &HashMap<String, String>) {
    let path = options
        .get("--output")
        .or_else(|| options.get("--store"))
        .map(String::as_str)
        .unwrap_or_else(|| fail("--store is required"));
    store
        .save(path)
        .unwrap_or_else(|e| fail(format!("writing '{}': {}", path, e)));
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| fail(e))
}

fn cmd_act(args: &[String]) {
    let options = parse_options(
        args,
        &["--store", "--merchant", "--from", "--to", "--format", "--config"],
        &[],
    );
    let config = load_config(&options);
    let clock = config.clock().unwrap_or_else(|e| fail(e));
    let store = load_store(required(&options, "--store"));

    let request = ActOfCompletionRequest {
        merchant_id: required(&options, "--merchant").to_string(),
        date_from: required(&options, "--from").to_string(),
        date_to: required(&options, "--to").to_string(),
    };

    let summaries = ReportSummaryAggregator::new(&store, clock);
    let rounder = Arc::new(MoneyRounder::new(Arc::new(RoundingPolicy::new(
        config.rounding_precision,
    ))));
    let calculator = ActOfCompletionCalculator::new(&store, &summaries, rounder, clock);
    let response = calculator.handle(&request);

    if options.get("--format").map(String::as_str) == Some("json") {
        println!("{}", to_json(&response));
    } else {
        match (&response.item, &response.message) {
            (Some(item), _) => {
                println!("{}", item);
                if let Ok(Some(merchant)) = store.get_by_id(&item.merchant_id) {
                    if let Some(balance) = MoneyValue::from_f64(item.balance, merchant.currency) {
                        println!("Payable:       {}", balance);
                    }
                }
            }
            (None, Some(message)) => eprintln!("{}: {}", message.code, message.message),
            (None, None) => {}
        }
    }

    if response.status != ResponseStatus::Ok {
        process::exit(if response.status == ResponseStatus::BadData { 2 } else { 1 });
    }
}

fn cmd_normalize_periods(args: &[String]) {
    let options = parse_options(args, &["--store", "--output", "--config"], &["--dry-run"]);
    let config = load_config(&options);
    let clock = config.clock().unwrap_or_else(|e| fail(e));
    let store = load_store(required(&options, "--store"));
    let dry_run = options.contains_key("--dry-run");

    let result = PeriodNormalizer::new(&store, &store, clock).dry_run(dry_run).run();
    // Corrections made before a failure are kept, so save either way.
    if !dry_run {
        save_store(&store, &options);
    }
    match result {
        Ok(report) => print!("{}", report),
        Err(e) => {
            error!("period normalization aborted: {}", e);
            fail(format!("{} (re-run to finish)", e));
        }
    }
}

fn cmd_backfill_vat(args: &[String]) {
    let options = parse_options(
        args,
        &["--store", "--output", "--config"],
        &["--payouts-only", "--royalties-only"],
    );
    let config = load_config(&options);
    let store = load_store(required(&options, "--store"));
    let scope = match (
        options.contains_key("--payouts-only"),
        options.contains_key("--royalties-only"),
    ) {
        (true, true) => fail("--payouts-only and --royalties-only are exclusive"),
        (true, false) => VatBackfillScope::PayoutsOnly,
        (false, true) => VatBackfillScope::RoyaltiesOnly,
        (false, false) => VatBackfillScope::All,
    };

    let job = VatBackfillJob::new(&store, &store, &store, &store, config.vat.clone());
    let result = job.run(scope);
    save_store(&store, &options);
    match result {
        Ok(report) => print!("{}", report),
        Err(e) => {
            error!("vat backfill aborted: {}", e);
            fail(format!("{} (re-run to finish)", e));
        }
    }
}

fn cmd_generate(args: &[String]) {
    let options = parse_options(
        args,
        &["--merchants", "--reports", "--per-payout", "--output", "--config"],
        &[],
    );
    let clock = load_config(&options).clock().unwrap_or_else(|e| fail(e));
    let number = |key: &str, default: usize| -> usize {
        match options.get(key) {
            Some(v) => v
                .parse()
                .unwrap_or_else(|_| fail(format!("{} requires a number", key))),
            None => default,
        }
    };

    let config = FixtureConfig {
        merchant_count: number("--merchants", 10),
        reports_per_merchant: number("--reports", 8),
        reports_per_payout: number("--per-payout", 4),
        clock,
        ..Default::default()
    };
    let snapshot = generate_random_store(&config);
    let json = to_json(&snapshot);

    if let Some(path) = options.get("--output") {
        fs::write(path, &json).unwrap_or_else(|e| fail(format!("writing '{}': {}", path, e)));
        eprintln!(
            "Generated {} merchants, {} reports, {} payouts → {}",
            snapshot.merchants.len(),
            snapshot.royalty_reports.len(),
            snapshot.payouts.len(),
            path
        );
    } else {
        println!("{}", json);
    }
}

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = args[1].as_str();
    let rest = &args[2..];

    match command {
        "act" => cmd_act(rest),
        "normalize-periods" => cmd_normalize_periods(rest),
        "backfill-vat" => cmd_backfill_vat(rest),
        "generate" => cmd_generate(rest),
        "help" | "--help" | "-h" => print_usage(),
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            process::exit(1);
        }
    }
}

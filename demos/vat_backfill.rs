//! B2B VAT backfill example.
//!
//! Generates a random store, repairs its period boundaries, then backfills
//! VAT for the default jurisdiction and shows that a second run is a no-op.

use royalty_settlement::config::{SettlementConfig, VatRule};
use royalty_settlement::core::party::CountryCode;
use royalty_settlement::jobs::period_normalizer::PeriodNormalizer;
use royalty_settlement::jobs::vat_backfill::{VatBackfillJob, VatBackfillScope};
use royalty_settlement::repository::memory::InMemoryStore;
use royalty_settlement::simulation::fixtures::{generate_random_store, FixtureConfig};

fn main() {
    env_logger::init();

    println!("╔══════════════════════════════════════════════╗");
    println!("║  royalty-settlement: VAT Backfill            ║");
    println!("╚══════════════════════════════════════════════╝\n");

    let fixtures = FixtureConfig {
        merchant_count: 8,
        reports_per_merchant: 6,
        reports_per_payout: 3,
        ..Default::default()
    };
    let store = InMemoryStore::new(generate_random_store(&fixtures));

    let mut config = SettlementConfig::default();
    // Cypriot operator charging German merchants as well.
    config.vat.rules.push(VatRule {
        operating_country: CountryCode::new("CY"),
        merchant_country: CountryCode::new("DE"),
        rate: 0.19,
    });
    config.validate().unwrap();
    let clock = config.clock().unwrap();

    println!("━━━ Step 1: Period normalization ━━━\n");
    let normalized = PeriodNormalizer::new(&store, &store, clock).run().unwrap();
    println!("{}", normalized);

    println!("━━━ Step 2: VAT backfill ━━━\n");
    let job = VatBackfillJob::new(&store, &store, &store, &store, config.vat.clone());
    let first = job.run(VatBackfillScope::All).unwrap();
    println!("{}", first);

    for payout in store.snapshot().payouts.iter().filter(|p| p.b2b_vat_rate > 0.0).take(3) {
        println!(
            "  payout {} [{} .. {}] {}: fees {:.2}, vat {:.2}, balance {:.2}",
            &payout.id[..8],
            payout.string_period_from,
            payout.string_period_to,
            payout.company.country,
            payout.total_fees,
            payout.b2b_vat_amount,
            payout.balance
        );
    }

    println!("\n━━━ Step 3: Re-run ━━━\n");
    let before = store.snapshot();
    job.run(VatBackfillScope::All).unwrap();
    let after = store.snapshot();
    println!(
        "Figures unchanged after second run: {}",
        before.payouts == after.payouts && before.royalty_reports == after.royalty_reports
    );
}

// 📜 Logging setup
//
// LEDGER_LOG takes a tracing filter, e.g. `LEDGER_LOG=season_ledger::store=debug`.
// Falls back to `season_ledger=info`.

use std::sync::Once;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Install the global subscriber. Safe to call more than once.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env("LEDGER_LOG")
            .unwrap_or_else(|_| EnvFilter::new("season_ledger=info"));

        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .with(filter)
            .init();
    });
}

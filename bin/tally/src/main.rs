//! tally ledger node binary.

fn main() -> eyre::Result<()> {
    // Enable backtraces unless a RUST_BACKTRACE value has already been explicitly set.
    if std::env::var_os("RUST_BACKTRACE").is_none() {
        // SAFETY: called before any other thread is spawned.
        unsafe { std::env::set_var("RUST_BACKTRACE", "1") };
    }

    tally_node_commands::run()
}

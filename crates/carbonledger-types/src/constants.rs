//! System-wide constants for the CarbonLedger registry and marketplace.

/// Hard cap on the marketplace fee: 2000 bps = 20%.
pub const MAX_FEE_BPS: u16 = 2000;

/// Basis-point denominator: 10_000 bps = 100%.
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Decimals of the reference settlement token (USDC-style).
pub const DEFAULT_SETTLEMENT_DECIMALS: u32 = 6;

/// Placeholder substituted with the certificate id in metadata URIs.
pub const URI_ID_PLACEHOLDER: &str = "{id}";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Ledger name.
pub const LEDGER_NAME: &str = "CarbonLedger";

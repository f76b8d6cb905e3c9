pub mod revocation_sweep;

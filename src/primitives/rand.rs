use std::cell::RefCell;

thread_local! {
    static RNG: RefCell<u64> = RefCell::new(0x123456789ABCDEF);
}

/// Deterministic per-thread LCG. Used for test-only padding bytes where
/// reproducibility matters more than entropy quality; never used to pick
/// a connection ID.
pub fn rand(modulus: u128) -> u8 {
    if modulus == 0 {
        return 0;
    }

    RNG.with(|rng| {
        let mut state = rng.borrow_mut();
        *state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (((*state >> 32) as u128) % modulus) as u8
    })
}

/// Fills `dst` with cryptographically-random bytes, for connection ID
/// generation at `connect`/`accept` time.
pub fn fill_random(dst: &mut [u8]) {
    use rand::RngCore;
    rand::thread_rng().fill_bytes(dst);
}

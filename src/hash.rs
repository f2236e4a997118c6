//! Deterministic hashing used by the synthetic terrain.

/// Xorshift mix of two lattice coordinates and a seed.
#[inline(always)]
pub fn lattice_hash(ix: i64, iy: i64, seed: u64) -> u64 {
    let mut h = (ix as u64)
        .wrapping_mul(2654435761)
        .wrapping_add((iy as u64).wrapping_mul(2246822519))
        .wrapping_add(seed);
    h ^= h << 13;
    h ^= h >> 7;
    h ^= h << 17;
    h
}

/// Map a hash to `[0, 1)` with a splitmix64 finaliser so nearby inputs decorrelate.
#[inline(always)]
pub fn unit_float(seed: u64) -> f64 {
    let mut x = seed.wrapping_mul(0x9e3779b97f4a7c15);
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58476d1ce4e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d049bb133111eb);
    x ^= x >> 31;
    (x >> 11) as f64 / 9007199254740992.0
}

/// Bilinearly smoothed value noise in `[0, 1)` over a unit lattice.
pub fn value_noise(x: f64, y: f64, seed: u64) -> f64 {
    let x0 = x.floor();
    let y0 = y.floor();
    let (ix, iy) = (x0 as i64, y0 as i64);
    let tx = smoothstep(x - x0);
    let ty = smoothstep(y - y0);

    let corner = |dx: i64, dy: i64| unit_float(lattice_hash(ix + dx, iy + dy, seed));
    let top = corner(0, 0) + (corner(1, 0) - corner(0, 0)) * tx;
    let bottom = corner(0, 1) + (corner(1, 1) - corner(0, 1)) * tx;
    top + (bottom - top) * ty
}

#[inline(always)]
fn smoothstep(t: f64) -> f64 {
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise_is_deterministic_and_bounded() {
        for i in 0..200 {
            let (x, y) = (i as f64 * 0.37 - 30.0, i as f64 * -0.11 + 4.0);
            let a = value_noise(x, y, 42);
            assert_eq!(a, value_noise(x, y, 42));
            assert!((0.0..1.0).contains(&a));
        }
    }

    #[test]
    fn test_noise_matches_lattice_at_integers() {
        let v = value_noise(3.0, -2.0, 9);
        assert_eq!(v, unit_float(lattice_hash(3, -2, 9)));
    }

    #[test]
    fn test_seed_changes_field() {
        assert_ne!(value_noise(0.5, 0.5, 1), value_noise(0.5, 0.5, 2));
    }
}

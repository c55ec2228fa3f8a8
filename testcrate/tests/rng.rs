use rand::Rng;
use rand_xoshiro::{
    rand_core::{RngCore, SeedableRng},
    Xoshiro128StarStar,
};
use tessera::{awi::*, StarRng};

/// Fills `bits` from `rng` in chunks of sizes chosen by `metarng`
fn fill_chunked(metarng: &mut Xoshiro128StarStar, rng: &mut StarRng, bits: &mut Bits) -> u64 {
    let mut used = 0;
    let mut actions = 0;
    while used < bits.bw() {
        let remaining = bits.bw() - used;
        let w = ((metarng.next_u32() % 100) as usize + 1).min(remaining);
        let chunk = rng.next_operand(bw(w));
        bits.field(used, &chunk, 0, w).unwrap();
        used += w;
        actions += 1;
    }
    actions
}

#[test]
fn star_rng() {
    const N: usize = 1 << 14;
    let mut metarng = Xoshiro128StarStar::seed_from_u64(1);
    let mut rng0 = StarRng::new(0);
    let mut rng1 = StarRng::new(0);
    let mut bits0 = Awi::zero(bw(N));
    let mut bits1 = Awi::zero(bw(N));
    let actions0 = fill_chunked(&mut metarng, &mut rng0, &mut bits0);
    let actions1 = fill_chunked(&mut metarng, &mut rng1, &mut bits1);
    // the chunking differs but the buffering is bitwise
    assert_ne!(actions0, 0);
    assert_ne!(actions1, 0);
    assert_eq!(bits0, bits1);
    // single bits come out of the same stream
    let mut rng2 = StarRng::new(0);
    for i in 0..256 {
        assert_eq!(rng2.next_bool(), bits0.get(i).unwrap());
    }

    let mut rng = StarRng::new(0);
    assert!(rng.index(&[0u8; 0]).is_none());
    let slice = [0usize, 1, 2, 3, 4, 5, 6];
    let mut counts = [0u64; 7];
    for _ in 0..N {
        counts[*rng.index(&slice).unwrap()] += 1;
    }
    // expectation is about 2341 each
    for c in counts {
        assert!((c > 2000) && (c < 2700), "{c}");
    }
    for _ in 0..N {
        let x = rng.next_in(3..=9);
        assert!((3..=9).contains(&x));
    }
    assert_eq!(rng.next_in(5..=5), 5);
    assert_eq!(rng.next_in(5..=4), 5);
    for _ in 0..N {
        let x: u32 = rng.gen_range(10..20);
        assert!((10..20).contains(&x));
    }
}

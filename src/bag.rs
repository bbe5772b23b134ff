use rand::Rng;

/// An ordered run of 7 piece-kind ids. A match's piece history is the
/// concatenation of its bags, addressed by 1-based bag index.
pub type Bag = [u8; 7];

pub const BAG_SIZE: usize = 7;

/// Draw without replacement from a shrinking pool of the 7 kinds: every
/// kind appears exactly once, order uniform among permutations.
pub fn seven_bag(rng: &mut impl Rng) -> Bag {
    let mut pool: Vec<u8> = (0..BAG_SIZE as u8).collect();
    let mut bag = [0u8; BAG_SIZE];
    for slot in bag.iter_mut() {
        let pos = rng.gen_range(0..pool.len());
        *slot = pool.remove(pos);
    }
    bag
}

/// Seven independent uniform draws with replacement; kinds may repeat.
pub fn random_bag(rng: &mut impl Rng) -> Bag {
    let mut bag = [0u8; BAG_SIZE];
    for slot in bag.iter_mut() {
        *slot = rng.gen_range(0..BAG_SIZE as u8);
    }
    bag
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::thread_rng;

    #[test]
    fn seven_bag_is_a_permutation() {
        let mut rng = thread_rng();
        for _ in 0..200 {
            let mut bag = seven_bag(&mut rng);
            bag.sort_unstable();
            assert_eq!(bag, [0, 1, 2, 3, 4, 5, 6]);
        }
    }

    #[test]
    fn random_bag_stays_in_range() {
        let mut rng = thread_rng();
        for _ in 0..200 {
            for id in random_bag(&mut rng) {
                assert!(id < 7);
            }
        }
    }
}

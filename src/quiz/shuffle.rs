use rand::Rng;

/// Fisher–Yates shuffle into a fresh vector; `items` is left untouched.
pub fn shuffle<T: Clone, R: Rng + ?Sized>(items: &[T], rng: &mut R) -> Vec<T> {
    let mut shuffled = items.to_vec();
    for i in (1..shuffled.len()).rev() {
        let j = rng.gen_range(0..=i);
        shuffled.swap(i, j);
    }
    return shuffled;
}

/// Same as [`shuffle`], drawing from the thread-local generator.
pub fn shuffle_array<T: Clone>(items: &[T]) -> Vec<T> {
    shuffle(items, &mut rand::thread_rng())
}

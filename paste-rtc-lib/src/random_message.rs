use rand::{seq::SliceRandom, thread_rng};

pub const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Uniformly random letters. Not suitable for secrets.
pub fn rand_seq(len: usize) -> String {
    let mut rng = thread_rng();
    (0..len)
        .filter_map(|_| LETTERS.choose(&mut rng))
        .map(|&b| b as char)
        .collect()
}

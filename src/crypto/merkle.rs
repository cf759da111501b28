//! Merkle root over the transactions of a block

use super::hash::{double_sha256, Hash256};

/// Calculate the merkle root from a list of transaction hashes
///
/// An odd node at any level is paired with itself.
pub fn calculate_merkle_root(hashes: &[Hash256]) -> Hash256 {
    if hashes.is_empty() {
        return Hash256::zero();
    }

    let mut level: Vec<Hash256> = hashes.to_vec();

    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let right = pair.get(1).unwrap_or(&pair[0]);
                let mut data = Vec::with_capacity(64);
                data.extend_from_slice(pair[0].as_bytes());
                data.extend_from_slice(right.as_bytes());
                double_sha256(&data)
            })
            .collect();
    }

    level[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_leaf_is_root() {
        let leaf = double_sha256(b"tx1");
        assert_eq!(calculate_merkle_root(&[leaf]), leaf);
    }

    #[test]
    fn test_order_matters() {
        let a = double_sha256(b"a");
        let b = double_sha256(b"b");
        assert_ne!(
            calculate_merkle_root(&[a, b]),
            calculate_merkle_root(&[b, a])
        );
    }

    #[test]
    fn test_odd_leaf_duplicated() {
        let a = double_sha256(b"a");
        let b = double_sha256(b"b");
        let c = double_sha256(b"c");
        assert_eq!(
            calculate_merkle_root(&[a, b, c]),
            calculate_merkle_root(&[a, b, c, c])
        );
    }
}

//! Utility functions for masking data frame payload data

/// Generates a random masking key
pub fn gen_mask() -> [u8; 4] {
	rand::random()
}

/// Masks data to send to a server, or unmasks data that was masked with `mask`.
pub fn mask_data(mask: [u8; 4], data: &[u8]) -> Vec<u8> {
	let mut out = data.to_vec();
	mask_in_place(mask, &mut out);
	out
}

/// XORs `data` with the repeating key, byte `i` with `mask[i % 4]`.
pub fn mask_in_place(mask: [u8; 4], data: &mut [u8]) {
	for (byte, key) in data.iter_mut().zip(mask.iter().cycle()) {
		*byte ^= key;
	}
}

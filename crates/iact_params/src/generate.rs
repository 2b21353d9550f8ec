//! Random value generators for name, password and uuid parameters.

use iact_config::PRODUCT_PREFIX;
use rand::seq::SliceRandom;
use rand::Rng;

/// Maximum length of a generated name.
pub const NAME_MAX_LEN: usize = 50;

/// Special characters allowed in generated passwords.
pub const PASSWORD_SPECIALS: &str = "!#$&{*:[=,]-_%@+";

const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
const DIGITS: &str = "0123456789";
const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const PER_CLASS: usize = 4;

/// `<prefix>-<random hex>`, at most [`NAME_MAX_LEN`] characters.
pub fn common_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut name = format!("{}-{:032x}", PRODUCT_PREFIX, rng.gen::<u128>());
    name.truncate(NAME_MAX_LEN);
    name
}

/// Sixteen characters: four distinct ones from each class, grouped as
/// lowercase, special, digit, uppercase.
pub fn password<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut out = String::with_capacity(PER_CLASS * 4);
    for class in [LOWERCASE, PASSWORD_SPECIALS, DIGITS, UPPERCASE] {
        let chars: Vec<char> = class.chars().collect();
        out.extend(chars.choose_multiple(rng, PER_CLASS));
    }
    out
}

/// Random (version 4) uuid string.
pub fn uuid<R: Rng + ?Sized>(rng: &mut R) -> String {
    uuid::Builder::from_random_bytes(rng.gen())
        .into_uuid()
        .to_string()
}

//! Random display names for fresh connections.

use rand::seq::SliceRandom;

const FIRST: &[&str] = &[
    "Swift", "Quiet", "Brave", "Sunny", "Clever", "Gentle", "Lucky", "Rowdy", "Mellow", "Dapper",
    "Curious", "Patient",
];

const LAST: &[&str] = &[
    "Capybara",
    "Otter",
    "Heron",
    "Tapir",
    "Jaguar",
    "Toucan",
    "Caiman",
    "Coati",
    "Ocelot",
    "Marmoset",
    "Anteater",
    "Armadillo",
];

/// Picks a two-word display name like `Swift Capybara`.
pub fn full_name() -> String {
    let mut rng = rand::thread_rng();
    let first = FIRST.choose(&mut rng).copied().unwrap_or("Nameless");
    let last = LAST.choose(&mut rng).copied().unwrap_or("Wanderer");
    format!("{first} {last}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_come_from_the_word_lists() {
        for _ in 0..32 {
            let name = full_name();
            let (first, last) = name.split_once(' ').expect("name should be two words");
            assert!(FIRST.contains(&first), "unexpected first word {first:?}");
            assert!(LAST.contains(&last), "unexpected last word {last:?}");
        }
    }
}

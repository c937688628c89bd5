//! Fixed categorical pools every generated record draws from.

pub const FIRST_NAMES: [&str; 24] = [
    "James", "Mary", "John", "Patricia", "Robert", "Jennifer", "Michael", "Linda", "William",
    "Elizabeth", "David", "Barbara", "Richard", "Susan", "Joseph", "Jessica", "Thomas", "Sarah",
    "Charles", "Karen", "Christopher", "Nancy", "Daniel", "Lisa",
];

pub const LAST_NAMES: [&str; 17] = [
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
    "Martinez", "Hernandez", "Lopez", "Gonzalez", "Wilson", "Anderson", "Thomas", "Taylor",
];

pub const CITIES: [&str; 15] = [
    "New York",
    "Los Angeles",
    "Chicago",
    "Houston",
    "Phoenix",
    "Philadelphia",
    "San Antonio",
    "San Diego",
    "Dallas",
    "San Jose",
    "Austin",
    "Jacksonville",
    "Fort Worth",
    "Columbus",
    "Charlotte",
];

pub const HOBBIES: [&str; 15] = [
    "reading",
    "sports",
    "music",
    "travel",
    "cooking",
    "photography",
    "gaming",
    "hiking",
    "painting",
    "dancing",
    "yoga",
    "cycling",
    "swimming",
    "gardening",
    "writing",
];

/// Inclusive age bounds.
pub const MIN_AGE: u32 = 18;
pub const MAX_AGE: u32 = 70;

/// Inclusive range of `metadata.created_year`.
pub const MIN_CREATED_YEAR: u32 = 2020;
pub const MAX_CREATED_YEAR: u32 = 2024;

/// Inclusive range of `metadata.score` before rounding.
pub const MIN_SCORE: f64 = 1.0;
pub const MAX_SCORE: f64 = 10.0;

/// Separator used when hobbies are flattened into a single column.
pub const HOBBY_DELIMITER: char = ',';

/// Relative sampling weight of an age: the 25..=45 band is three times as
/// likely as the tails, 20..=50 twice as likely.
pub fn age_weight(age: u32) -> u32 {
    match age {
        25..=45 => 3,
        20..=50 => 2,
        _ => 1,
    }
}

/// Upper bound on the number of hobbies a person of `age` can have.
pub fn max_hobbies(age: u32) -> usize {
    6usize.saturating_sub((age / 15) as usize).max(1)
}

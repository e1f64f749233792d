//! Theme word lists consulted by the puzzle generator.

pub const DEFAULT_THEME: &str = "animals";

const ANIMALS: &[&str] = &[
    "cat", "dog", "fox", "owl", "bat", "elk", "ant", "bee", "horse", "tiger", "lion", "zebra",
    "panda", "eagle", "shark", "whale", "otter", "camel", "moose", "lemur", "gecko", "bison",
    "crane", "raven", "cobra", "hyena", "badger", "donkey", "ferret", "iguana", "jaguar", "parrot",
    "rabbit", "salmon", "turtle", "walrus", "monkey", "leopard", "penguin", "dolphin", "elephant",
    "kangaroo", "butterfly", "porcupine",
];

const FOOD: &[&str] = &[
    "pie", "egg", "ham", "jam", "rice", "bread", "apple", "mango", "pasta", "pizza", "olive",
    "bacon", "salad", "sushi", "donut", "grape", "lemon", "melon", "onion", "peach", "toast",
    "waffle", "cheese", "butter", "carrot", "tomato", "noodle", "omelet", "pancake", "pretzel",
    "avocado", "burrito", "lasagna", "pudding", "sandwich", "dumpling", "croissant",
];

const SPACE: &[&str] = &[
    "sun", "ion", "sky", "star", "moon", "mars", "venus", "comet", "orbit", "pluto", "lunar",
    "saturn", "nebula", "meteor", "galaxy", "rocket", "cosmos", "apollo", "jupiter", "neptune",
    "mercury", "gravity", "eclipse", "asteroid", "starlight", "satellite", "telescope",
    "supernova", "spacecraft",
];

const SPORTS: &[&str] = &[
    "run", "row", "ski", "golf", "swim", "dive", "race", "goal", "rugby", "track", "skate",
    "serve", "tennis", "soccer", "hockey", "boxing", "karate", "archery", "cycling", "bowling",
    "cricket", "javelin", "marathon", "swimming", "badminton", "wrestling", "sprinting",
    "volleyball", "basketball",
];

const OCEAN: &[&str] = &[
    "sea", "eel", "ray", "kelp", "wave", "tide", "crab", "reef", "coral", "shell", "pearl",
    "squid", "algae", "anchor", "lagoon", "marlin", "urchin", "oyster", "sponge", "anemone",
    "current", "dolphin", "octopus", "plankton", "seahorse", "starfish", "barnacle", "jellyfish",
];

/// Word list for a theme; unknown themes fall back to the default list so
/// generation never fails on a bad theme name.
pub fn words_for_theme(theme: &str) -> &'static [&'static str] {
    match theme.to_ascii_lowercase().as_str() {
        "animals" => ANIMALS,
        "food" => FOOD,
        "space" => SPACE,
        "sports" => SPORTS,
        "ocean" => OCEAN,
        _ => ANIMALS,
    }
}

pub fn themes() -> &'static [&'static str] {
    &["animals", "food", "space", "sports", "ocean"]
}

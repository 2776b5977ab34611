//! Genre list and the local bank of opening premises.

use crate::services::generator::StoryGenerator;
use crate::utils::text::sanitize;
use rand::seq::IndexedRandom;

pub const CUSTOM_GENRE: &str = "Other / Custom";

pub const GENRES: [&str; 26] = [
    "Fantasy",
    "Science Fiction",
    "Mystery",
    "Thriller",
    "Romance",
    "Historical Fiction",
    "Horror",
    "Literary Fiction",
    "Young Adult",
    "Adventure",
    "Dystopian",
    "Magical Realism",
    "Crime",
    "Contemporary",
    "Paranormal",
    "Urban Fantasy",
    "Steampunk",
    "Cyberpunk",
    "Space Opera",
    "Post-Apocalyptic",
    "Time Travel",
    "Alternate History",
    "Mythology & Folklore",
    "Western",
    "Humor/Satire",
    CUSTOM_GENRE,
];

const FALLBACK_GENRE: &str = "Contemporary";

fn seeds_for(genre: &str) -> Option<&'static [&'static str]> {
    let seeds: &'static [&'static str] = match genre {
        "Fantasy" => &[
            "At dawn, the rune on the gate pulsed for the first time in a century.",
            "The map ink refused to dry, writhing toward a place no one named.",
            "A courier staggers into town carrying a crown that chooses its wearer.",
        ],
        "Science Fiction" => &[
            "The station\u{2019}s night cycle failed, revealing stars no chart recognized.",
            "A maintenance drone began writing poetry on the hull.",
            "Your jump log shows an arrival time that predates your departure.",
        ],
        "Mystery" => &[
            "The clock tower chimed thirteen; everyone swore it never had.",
            "A letter arrives\u{2014}postmarked tomorrow\u{2014}containing your fingerprints.",
            "The museum\u{2019}s emptiest display case just set off the alarm.",
        ],
        "Thriller" => &[
            "Your phone vibrates: a live feed from your own living room.",
            "A red dot dances across the train window and settles on you.",
            "Six minutes left until the auction ends and your alias expires.",
        ],
        "Romance" => &[
            "The storm canceled everything\u{2014}except the smile at gate C7.",
            "A misdelivered bouquet carries your exact favorite flowers.",
            "Two rival bakers tie for first, then share a kitchen for a week.",
        ],
        "Historical Fiction" => &[
            "News from the front arrives with a coded sketch of the city.",
            "A forbidden book survives the fire, smelling of salt and smoke.",
            "On coronation morning, the seamstress finds a hidden note.",
        ],
        "Horror" => &[
            "Every mirror in the house shows you blinking out of sync.",
            "The town\u{2019}s last obituary describes someone still breathing.",
            "Your neighbor\u{2019}s wind chimes play a tune you heard underground.",
        ],
        "Literary Fiction" => &[
            "On the third morning, the river returns your father\u{2019}s watch.",
            "She catalogs the things they never said, alphabetized by regret.",
            "The city learns to speak softly, and only the lonely hear it.",
        ],
        "Young Adult" => &[
            "The cafeteria ceiling map lights up above your table\u{2014}only yours.",
            "Your locker combination opens a door behind the gym.",
            "Detention ends with a field trip to a place not built yet.",
        ],
        "Adventure" => &[
            "The rope bridge holds, but the mountain hums like a throat clearing.",
            "A bottle washes ashore with coordinates written twice.",
            "You inherit a compass that points to whatever you\u{2019}re avoiding.",
        ],
        "Dystopian" => &[
            "The billboard corrects your memory in real time\u{2014}again.",
            "Curfew sirens falter, replaced by a child counting to ten.",
            "Your ration card prints a second name below yours.",
        ],
        "Magical Realism" => &[
            "Your apartment grows a window that faces last summer.",
            "Today\u{2019}s rain smells exactly like cinnamon and apologies.",
            "Grandmother\u{2019}s teacup refuses to hold anything but the truth.",
        ],
        "Crime" => &[
            "The safe is empty except for a receipt in your handwriting.",
            "Someone fenced the evidence before the crime happened.",
            "Your alibi calls you from a blocked number.",
        ],
        "Contemporary" => &[
            "The group chat votes to meet offline for the first time in years.",
            "A package arrives with a note: \u{201C}You left this in 2012.\u{201D}",
            "Your rideshare driver is your ex\u{2019}s new partner.",
        ],
        "Paranormal" => &[
            "The ghost in your kitchen starts leaving grocery lists.",
            "Streetlights flicker Morse code spelling your name.",
            "Your shadow lags behind, staring at something you can\u{2019}t see.",
        ],
        "Urban Fantasy" => &[
            "The subway skips a station and stops at a platform with ivy.",
            "Vendors start selling spells with exact change only.",
            "A graffiti tag glows and asks where you\u{2019}ve been.",
        ],
        "Steampunk" => &[
            "The automaton in the square sneezes coal dust and a key.",
            "Airships circle a storm that never moves off the city.",
            "Your goggles reveal a blueprint hidden in the fog.",
        ],
        "Cyberpunk" => &[
            "Your reflection boots a different OS.",
            "An ad follows you into a dead zone and keeps talking.",
            "The city\u{2019}s firewall grows teeth at midnight.",
        ],
        "Space Opera" => &[
            "The admiral orders silence; the stars begin to sing anyway.",
            "Your ship receives a royal summons from an extinct dynasty.",
            "An asteroid writes a message in your wake.",
        ],
        "Post-Apocalyptic" => &[
            "The Geiger counter laughs\u{2014}a sound it shouldn\u{2019}t make.",
            "A library survives, guarded by a flock of trained crows.",
            "The highway is clear for the first time since the sirens.",
        ],
        "Time Travel" => &[
            "Your future self texts: \u{201C}Don\u{2019}t open the blue door. Not yet.\u{201D}",
            "The calendar repeats the same Tuesday until you apologize.",
            "A museum exhibit features your watch, scratched tomorrow.",
        ],
        "Alternate History" => &[
            "The treaty is signed with ink that refuses to dry.",
            "A coin flip crowns the wrong monarch.",
            "A telegram arrives addressed to a country that never existed.",
        ],
        "Mythology & Folklore" => &[
            "A fox leaves footprints on your ceiling.",
            "The river demands a story before letting you cross.",
            "You inherit a name that opens locked hills.",
        ],
        "Western" => &[
            "The new sheriff rides in with rainclouds.",
            "A wanted poster lists your horse\u{2019}s name.",
            "High noon comes early and doesn\u{2019}t leave.",
        ],
        "Humor/Satire" => &[
            "Breaking: your toaster starts a podcast about bread trauma.",
            "You win a lifetime supply of disclaimers.",
            "The HOA elects a raccoon and productivity soars.",
        ],
        _ => return None,
    };
    Some(seeds)
}

/// The category sent to the generator for a genre picker state.
pub fn effective_category(genre: &str, custom: &str) -> String {
    let custom = custom.trim();
    if genre == CUSTOM_GENRE && !custom.is_empty() {
        custom.to_string()
    } else {
        genre.to_string()
    }
}

pub fn random_seed_for_genre(genre: &str) -> String {
    let seeds = seeds_for(genre)
        .or_else(|| seeds_for(FALLBACK_GENRE))
        .unwrap_or_default();
    let seed = seeds
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or("A mysterious knock arrives at an impossible hour.");
    sanitize(seed)
}

/// A fresh premise from the generator, or one from the local bank.
pub async fn shuffle_seed(generator: &dyn StoryGenerator, category: &str) -> String {
    match generator.seed(category).await {
        Ok(seed) if !seed.trim().is_empty() => seed.trim().to_string(),
        Ok(_) => {
            log::warn!("Generator returned an empty seed, using the local bank");
            random_seed_for_genre(category)
        }
        Err(e) => {
            log::warn!("Seed request failed ({}), using the local bank", e);
            random_seed_for_genre(category)
        }
    }
}

//! Persona definitions — styles that shape how the LLM responds.
//!
//! Each built-in persona carries a name, a one-line description for the
//! banner, and the style line injected into the system prompt. Any other
//! name is accepted by `/persona` and stored as-is; it only falls back to a
//! generic style when a reply is generated.

/// A built-in persona.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Persona {
    /// Short identifier typed after `/persona`.
    pub name: &'static str,
    /// One-line description shown in the banner.
    pub description: &'static str,
    /// The style instruction injected into the system prompt.
    pub style: &'static str,
}

/// Style used for names that are not built in.
pub const FALLBACK_STYLE: &str = "Be yourself.";

pub const BUILTIN_PERSONAS: &[Persona] = &[
    Persona {
        name: "pirate",
        description: "rough, adventurous, full of 'Arrr!'",
        style: "Talk like a pirate: rough, adventurous, and full of 'Arrr!'",
    },
    Persona {
        name: "clown",
        description: "playful circus jokes",
        style: "Speak playfully and make silly jokes like a circus clown.",
    },
    Persona {
        name: "surfer",
        description: "chill surfer slang",
        style: "Sound chill and use surfer slang.",
    },
    Persona {
        name: "frenchman",
        description: "sophisticated and slightly dramatic",
        style: "Be sophisticated and slightly dramatic with a French accent.",
    },
    Persona {
        name: "jimmy",
        description: "relaxed and beachy",
        style: "Be relaxed and beachy, like Jimmy Buffett.",
    },
    Persona {
        name: "neutral",
        description: "helpful and conversational",
        style: "Be helpful and conversational.",
    },
];

/// Look up a built-in persona by name, ignoring case.
pub fn find_persona(name: &str) -> Option<&'static Persona> {
    let name = name.trim();
    BUILTIN_PERSONAS
        .iter()
        .find(|persona| persona.name.eq_ignore_ascii_case(name))
}

/// Style instruction for `name`; unknown names get [`FALLBACK_STYLE`].
pub fn persona_prompt(name: &str) -> &'static str {
    find_persona(name).map_or(FALLBACK_STYLE, |persona| persona.style)
}

/// Full system prompt for a reply in the given persona.
pub fn system_prompt(persona: &str, tools_available: bool) -> String {
    let style = persona_prompt(persona);
    let now = chrono::Local::now().format("%A, %B %e, %Y at %H:%M");
    if tools_available {
        format!(
            "{style} The current date and time is {now}. \
             Use the web_search and get_weather tools when the user asks about \
             current events or the weather, and stay in character when summarizing results."
        )
    } else {
        format!("{style} The current date and time is {now}.")
    }
}

/// Comma-separated built-in names for hints.
pub fn persona_names() -> String {
    BUILTIN_PERSONAS
        .iter()
        .filter(|persona| persona.name != "neutral")
        .map(|persona| persona.name)
        .collect::<Vec<_>>()
        .join(", ")
}

use shared::domain::{Clue, Code, CodeKind, MAX_PROGRESS};

const DECOY_MESSAGE: &str = "IT IS NOT A CORRECT QR CODE. SEARCH FOR THE NEXT QR CODE";
const DECOY_SUFFIXES: [&str; 3] = ["A", "B", "C"];

const CLUE_TEXT: [(&str, &str); 11] = [
    (
        "Welcome, Detective! Your journey begins where everyone who enters is watched.",
        "Check near the main entrance",
    ),
    (
        "I have four legs but cannot walk; I wait outside while others talk.",
        "Look for a bench in the garden",
    ),
    (
        "Climb to the third floor and find the door numbered three hundred and twenty-three.",
        "Third floor classrooms",
    ),
    (
        "From the classroom to the grand stage: find the entrance of the main hall.",
        "Main hall doors",
    ),
    (
        "Brainpower needs water. Find where the silver tap flows first.",
        "Water fountain by the canteen",
    ),
    (
        "Thirst is gone, now hunger calls. Find the one who serves the snacks.",
        "Canteen counter",
    ),
    (
        "Not food, not class this time. Look for wheels that do not climb.",
        "Parking area",
    ),
    (
        "Where notices hang and students pass by, the ground floor board holds the way.",
        "Ground floor notice board",
    ),
    (
        "Where complaints are written in pen and dropped away, your next clue waits.",
        "Suggestion box",
    ),
    (
        "Culture and stage so grand: collect what was placed with care.",
        "Around the auditorium stage",
    ),
    (
        "Find the smiling face who planned this race and tell them you are done.",
        "Find the event organizer",
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleTeam {
    pub name: &'static str,
    pub password: &'static str,
    pub member_count: u8,
}

/// Clue 0 is the opening text; clue N is shown once clue N was solved.
pub fn default_clues() -> Vec<Clue> {
    CLUE_TEXT
        .iter()
        .enumerate()
        .map(|(number, (text, hint))| Clue {
            clue_number: number as u8,
            text: (*text).to_string(),
            hint: Some((*hint).to_string()),
        })
        .collect()
}

/// One correct payload and three decoys per clue 1..=10.
pub fn default_codes() -> Vec<Code> {
    let mut codes = Vec::with_capacity(usize::from(MAX_PROGRESS) * 4);
    for n in 1..=MAX_PROGRESS {
        codes.push(Code {
            value: format!("HUNT-CLUE-{n}-CORRECT"),
            kind: CodeKind::Correct {
                clue_number: Some(n),
            },
        });
        for suffix in DECOY_SUFFIXES {
            codes.push(Code {
                value: format!("HUNT-CLUE-{n}-FAKE-{suffix}"),
                kind: CodeKind::Decoy {
                    message: Some(DECOY_MESSAGE.to_string()),
                },
            });
        }
    }
    codes
}

pub fn sample_teams() -> [SampleTeam; 4] {
    [
        SampleTeam {
            name: "Shadow Seekers",
            password: "shadow1",
            member_count: 3,
        },
        SampleTeam {
            name: "Code Breakers",
            password: "code1",
            member_count: 4,
        },
        SampleTeam {
            name: "Mystery Mavens",
            password: "mystery1",
            member_count: 2,
        },
        SampleTeam {
            name: "Clue Chasers",
            password: "clue1",
            member_count: 3,
        },
    ]
}

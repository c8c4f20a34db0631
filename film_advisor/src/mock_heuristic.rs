//! Filename-keyed stand-in for the classifier.
//!
//! Used when no trained weights are available so the demo still produces
//! plausible answers. This is not production logic: the rules below only
//! look at the uploaded file's name and must stay exactly as they are.

use surface_model::{Finish, Material, Prediction};

struct Rule {
    keywords: [&'static str; 3],
    material: Material,
    material_confidence: f32,
    finish: Finish,
    finish_confidence: f32,
}

const RULES: [Rule; 3] = [
    Rule {
        keywords: ["mirror", "shiny", "101"],
        material: Material::Metal,
        material_confidence: 0.92,
        finish: Finish::Mirror,
        finish_confidence: 0.95,
    },
    Rule {
        keywords: ["rough", "sandblast", "305"],
        material: Material::Metal,
        material_confidence: 0.88,
        finish: Finish::Rough,
        finish_confidence: 0.91,
    },
    Rule {
        keywords: ["paint", "glossy", "500"],
        material: Material::Painted,
        material_confidence: 0.94,
        finish: Finish::Glossy,
        finish_confidence: 0.89,
    },
];

pub fn predict(filename: &str) -> Prediction {
    let filename = filename.to_lowercase();

    RULES
        .iter()
        .find(|rule| rule.keywords.iter().any(|k| filename.contains(k)))
        .map(|rule| {
            Prediction::new(
                rule.material,
                rule.material_confidence,
                rule.finish,
                rule.finish_confidence,
            )
        })
        .unwrap_or_else(|| Prediction::new(Material::Metal, 0.60, Finish::Mirror, 0.55))
}

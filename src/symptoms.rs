//! Triage symptom keys produced by AI extraction, with display labels.
//!
//! The set is closed, plus an `Unknown` bucket so a newer extraction model
//! never makes a batch unreadable. Unknown keys display verbatim.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymptomCategory {
    Airway,
    Breathing,
    Circulation,
    Neurological,
    Trauma,
    Other,
    Pediatric,
    General,
    Unclassified,
}

impl SymptomCategory {
    pub fn label(&self) -> &'static str {
        match self {
            SymptomCategory::Airway => "Airway",
            SymptomCategory::Breathing => "Breathing",
            SymptomCategory::Circulation => "Circulation",
            SymptomCategory::Neurological => "Neurological",
            SymptomCategory::Trauma => "Trauma",
            SymptomCategory::Other => "Other Critical",
            SymptomCategory::Pediatric => "Pediatric",
            SymptomCategory::General => "General",
            SymptomCategory::Unclassified => "Unclassified",
        }
    }
}

macro_rules! symptoms {
    ($( $variant:ident => ($key:literal, $label:literal, $category:ident) ),+ $(,)?) => {
        /// A triage symptom flag. Variant order is clinical (ABC first), so
        /// ordered maps list symptoms the way the triage screen does.
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Symptom {
            $( $variant, )+
            Unknown(String),
        }

        impl Symptom {
            /// Every recognised symptom, in display order.
            pub const KNOWN: &'static [Symptom] = &[ $( Symptom::$variant, )+ ];

            /// Parse a wire key; unrecognised keys land in `Unknown`.
            pub fn from_key(key: &str) -> Self {
                match key {
                    $( $key => Symptom::$variant, )+
                    other => Symptom::Unknown(other.to_string()),
                }
            }

            pub fn key(&self) -> &str {
                match self {
                    $( Symptom::$variant => $key, )+
                    Symptom::Unknown(key) => key,
                }
            }

            pub fn label(&self) -> &str {
                match self {
                    $( Symptom::$variant => $label, )+
                    Symptom::Unknown(key) => key,
                }
            }

            pub fn category(&self) -> SymptomCategory {
                match self {
                    $( Symptom::$variant => SymptomCategory::$category, )+
                    Symptom::Unknown(_) => SymptomCategory::Unclassified,
                }
            }
        }
    };
}

symptoms! {
    ObstructedAirway => ("obstructed_airway", "Obstructed Airway", Airway),
    FacialBurns => ("facial_burns", "Facial Burns", Airway),
    Stridor => ("stridor", "Stridor", Airway),
    SevereRespiratoryDistress => ("severe_respiratory_distress", "Severe Resp Distress", Breathing),
    ModerateRespiratoryDistress => ("moderate_respiratory_distress", "Moderate Resp Distress", Breathing),
    MildRespiratorySymptoms => ("mild_respiratory_symptoms", "Mild Resp Symptoms", Breathing),
    Cyanosis => ("cyanosis", "Cyanosis", Breathing),
    Apnea => ("apnea", "Apnea", Breathing),
    Shock => ("shock", "Shock", Circulation),
    SevereBleeding => ("severe_bleeding", "Severe Bleeding", Circulation),
    CardiacArrest => ("cardiac_arrest", "Cardiac Arrest", Circulation),
    ChestPain => ("chest_pain", "Chest Pain", Circulation),
    ChestPainWithHypotension => ("chest_pain_with_hypotension", "Chest Pain + Hypotension", Circulation),
    SeizureOngoing => ("seizure_ongoing", "Seizure (Ongoing)", Neurological),
    SeizureControlled => ("seizure_controlled", "Seizure (Controlled)", Neurological),
    Confusion => ("confusion", "Confusion", Neurological),
    FocalDeficits => ("focal_deficits", "Focal Deficits", Neurological),
    LethargicUnconscious => ("lethargic_unconscious", "Lethargic/Unconscious", Neurological),
    MajorTrauma => ("major_trauma", "Major Trauma", Trauma),
    ModerateTrauma => ("moderate_trauma", "Moderate Trauma", Trauma),
    MinorInjury => ("minor_injury", "Minor Injury", Trauma),
    SevereBurns => ("severe_burns", "Severe Burns", Other),
    Anaphylaxis => ("anaphylaxis", "Anaphylaxis", Other),
    SuspectedStroke => ("suspected_stroke", "Suspected Stroke", Other),
    Sepsis => ("sepsis", "Sepsis", Other),
    GiBleed => ("gi_bleed", "GI Bleed", Other),
    Fever => ("fever", "Fever", Other),
    NonBlanchingRash => ("non_blanching_rash", "Non-blanching Rash", Other),
    SevereDehydration => ("severe_dehydration", "Severe Dehydration", Pediatric),
    ModerateDehydration => ("moderate_dehydration", "Moderate Dehydration", Pediatric),
    AbdominalPainSevere => ("abdominal_pain_severe", "Severe Abdominal Pain", General),
    AbdominalPainModerate => ("abdominal_pain_moderate", "Moderate Abdominal Pain", General),
    AbdominalPainMild => ("abdominal_pain_mild", "Mild Abdominal Pain", General),
}

impl Symptom {
    pub fn is_known(&self) -> bool {
        !matches!(self, Symptom::Unknown(_))
    }
}

impl std::fmt::Display for Symptom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl Serialize for Symptom {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

impl<'de> Deserialize<'de> for Symptom {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let key = String::deserialize(deserializer)?;
        Ok(Symptom::from_key(&key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashSet};

    #[test]
    fn test_known_keys_round_trip() {
        assert_eq!(Symptom::KNOWN.len(), 33);
        for symptom in Symptom::KNOWN {
            assert_eq!(&Symptom::from_key(symptom.key()), symptom);
            assert!(symptom.is_known());
        }
    }

    #[test]
    fn test_keys_are_unique() {
        let keys: HashSet<&str> = Symptom::KNOWN.iter().map(|s| s.key()).collect();
        assert_eq!(keys.len(), Symptom::KNOWN.len());
    }

    #[test]
    fn test_labels() {
        assert_eq!(
            Symptom::ChestPainWithHypotension.label(),
            "Chest Pain + Hypotension"
        );
        assert_eq!(Symptom::SeizureOngoing.label(), "Seizure (Ongoing)");
        assert_eq!(Symptom::GiBleed.label(), "GI Bleed");
    }

    #[test]
    fn test_unknown_key_displays_verbatim() {
        let symptom = Symptom::from_key("hiccups");
        assert_eq!(symptom, Symptom::Unknown("hiccups".to_string()));
        assert_eq!(symptom.label(), "hiccups");
        assert_eq!(symptom.category(), SymptomCategory::Unclassified);
        assert!(!symptom.is_known());
    }

    #[test]
    fn test_categories() {
        assert_eq!(Symptom::Stridor.category(), SymptomCategory::Airway);
        assert_eq!(Symptom::Apnea.category(), SymptomCategory::Breathing);
        assert_eq!(Symptom::Shock.category(), SymptomCategory::Circulation);
        assert_eq!(Symptom::Confusion.category(), SymptomCategory::Neurological);
        assert_eq!(Symptom::MinorInjury.category(), SymptomCategory::Trauma);
        assert_eq!(Symptom::Sepsis.category(), SymptomCategory::Other);
        assert_eq!(Symptom::SevereDehydration.category(), SymptomCategory::Pediatric);
        assert_eq!(Symptom::AbdominalPainMild.category(), SymptomCategory::General);
    }

    #[test]
    fn test_symptom_map_deserializes_with_unknowns() {
        let json = r#"{"fever": true, "chest_pain": false, "hiccups": true}"#;
        let map: BTreeMap<Symptom, bool> = serde_json::from_str(json).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map.get(&Symptom::Fever), Some(&true));
        assert_eq!(map.get(&Symptom::ChestPain), Some(&false));
        assert_eq!(map.get(&Symptom::from_key("hiccups")), Some(&true));

        // Clinical order: chest pain (circulation) before fever (other)
        let order: Vec<&str> = map.keys().map(|s| s.key()).collect();
        assert_eq!(order, vec!["chest_pain", "fever", "hiccups"]);
    }

    #[test]
    fn test_symptom_serializes_as_key() {
        assert_eq!(
            serde_json::to_string(&Symptom::NonBlanchingRash).unwrap(),
            "\"non_blanching_rash\""
        );
    }
}

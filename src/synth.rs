//! Placeholder values for fields the source does not reliably expose.
//!
//! Shapes are fixed, values are random. The caller supplies the RNG so a seeded
//! generator gives reproducible output.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, TimeZone, Weekday};
use rand::seq::IndexedRandom;
use rand::Rng;

use crate::model::{Modality, ServiceOffering, TimeSlot};
use crate::parser::extract::availability::AvailabilityWindow;
use crate::parser::normalize::fold;

pub const GENERIC_SERVICE: &str = "Consulta general";
const DURATIONS: &[u32] = &[30, 45, 60];
const PRICE_RANGE: std::ops::RangeInclusive<u32> = 50..=250;

/// First key contained in the folded category wins.
const SERVICE_TABLE: &[(&str, &[&str])] = &[
    (
        "psiquiatr",
        &["Consulta psiquiátrica", "Evaluación psiquiátrica", "Control de medicación"],
    ),
    (
        "psicolog",
        &[
            "Terapia individual",
            "Terapia de pareja",
            "Evaluación psicológica",
            "Terapia familiar",
        ],
    ),
    (
        "odontolog",
        &["Limpieza dental", "Curación dental", "Extracción dental", "Blanqueamiento dental"],
    ),
    ("dentist", &["Limpieza dental", "Curación dental", "Extracción dental"]),
    ("pediatr", &["Consulta pediátrica", "Control de niño sano", "Vacunación"]),
    ("ginecolog", &["Consulta ginecológica", "Papanicolaou", "Ecografía transvaginal"]),
    ("dermatolog", &["Consulta dermatológica", "Tratamiento de acné", "Crioterapia"]),
    ("cardiolog", &["Consulta cardiológica", "Electrocardiograma", "Riesgo quirúrgico"]),
    ("nutri", &["Consulta nutricional", "Plan de alimentación", "Control de peso"]),
    ("traumatolog", &["Consulta traumatológica", "Infiltración", "Evaluación de lesiones"]),
    ("oftalmolog", &["Consulta oftalmológica", "Medida de vista", "Fondo de ojo"]),
    ("fisioterap", &["Sesión de fisioterapia", "Terapia física", "Rehabilitación"]),
    ("terapia fisica", &["Sesión de terapia física", "Rehabilitación", "Electroterapia"]),
    ("medicina general", &[GENERIC_SERVICE, "Certificado médico", "Chequeo preventivo"]),
];

const MORNING: (u32, u32) = (9, 13);
const AFTERNOON: (u32, u32) = (15, 19);

pub fn service_names(category: &str) -> &'static [&'static str] {
    let folded = fold(category);
    SERVICE_TABLE
        .iter()
        .find(|(key, _)| folded.contains(key))
        .map(|(_, names)| *names)
        .unwrap_or(&[GENERIC_SERVICE])
}

pub fn services<R: Rng + ?Sized>(
    category: &str,
    currency: &str,
    rng: &mut R,
) -> Vec<ServiceOffering> {
    service_names(category)
        .iter()
        .map(|name| ServiceOffering {
            name: name.to_string(),
            price: Some(f64::from(rng.random_range(PRICE_RANGE))),
            currency: Some(currency.to_string()),
            duration_minutes: DURATIONS.choose(&mut *rng).copied().unwrap_or(30),
        })
        .collect()
}

pub fn modality_for(address: &str) -> Modality {
    let folded = fold(address);
    if folded.contains("online") || folded.contains("en linea") {
        Modality::Remote
    } else {
        Modality::InPerson
    }
}

/// Morning and afternoon blocks on every weekday of the window.
pub fn availability(window: &AvailabilityWindow, address: &str) -> Vec<TimeSlot> {
    let modality = modality_for(address);
    let offset = *window.start.offset();

    window
        .days()
        .filter(|day| !matches!(day.weekday(), Weekday::Sat | Weekday::Sun))
        .flat_map(|day| {
            [MORNING, AFTERNOON].into_iter().filter_map(move |(from, to)| {
                TimeSlot::new(at(offset, day, from)?, at(offset, day, to)?, modality)
            })
        })
        .filter(|slot| window.contains(slot))
        .collect()
}

fn at(offset: FixedOffset, day: NaiveDate, hour: u32) -> Option<DateTime<FixedOffset>> {
    let time = NaiveTime::from_hms_opt(hour, 0, 0)?;
    offset.from_local_datetime(&day.and_time(time)).single()
}

/// Nine digits, leading 9.
pub fn phone<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("9{:08}", rng.random_range(0..100_000_000u32))
}

pub fn address(locality: &str) -> String {
    format!("Consultorio en {}", locality)
}

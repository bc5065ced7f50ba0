//! Parámetros de job.
//!
//! Un `JobParameters` es un mapa ordenado (orden de inserción) de nombre a
//! valor tipado. Cada entrada puede ser identificadora (participa en la
//! identidad de la instancia vía `job_key`) o no identificadora (puede variar
//! libremente entre re-ejecuciones de la misma instancia).

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::hashing::canonical_digest;

/// Valor tipado de un parámetro: suma cerrada.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    String(String),
    Date(DateTime<Utc>),
    Long(i64),
    Double(f64),
}

impl ParamValue {
    /// Etiqueta de tipo usada en el documento almacenado.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::String(_) => "STRING",
            Self::Date(_) => "DATE",
            Self::Long(_) => "LONG",
            Self::Double(_) => "DOUBLE",
        }
    }

    /// Valor JSON nativo (fechas en RFC 3339 con nanosegundos). Los dobles no
    /// finitos no tienen número JSON: van como `"NaN"`, `"Infinity"` o
    /// `"-Infinity"`.
    pub fn to_json(&self) -> Value {
        match self {
            Self::String(s) => Value::String(s.clone()),
            Self::Date(d) => Value::String(d.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::Long(n) => Value::from(*n),
            Self::Double(x) if x.is_nan() => Value::String(NAN.into()),
            Self::Double(x) if x.is_infinite() => {
                Value::String(if *x > 0.0 { INFINITY } else { NEG_INFINITY }.into())
            }
            Self::Double(x) => Value::from(*x),
        }
    }

    /// Inversa de `type_tag` + `to_json`. `None` si la etiqueta no se reconoce
    /// o el valor no tiene el tipo esperado.
    pub fn from_tagged(tag: &str, value: &Value) -> Option<Self> {
        match tag {
            "STRING" => value.as_str().map(|s| Self::String(s.to_string())),
            "DATE" => value.as_str()
                           .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                           .map(|d| Self::Date(d.with_timezone(&Utc))),
            "LONG" => value.as_i64().map(Self::Long),
            "DOUBLE" => match value {
                Value::String(s) => parse_non_finite(s).map(Self::Double),
                other => other.as_f64().map(Self::Double),
            },
            _ => None,
        }
    }
}

const NAN: &str = "NaN";
const INFINITY: &str = "Infinity";
const NEG_INFINITY: &str = "-Infinity";

fn parse_non_finite(s: &str) -> Option<f64> {
    match s {
        NAN => Some(f64::NAN),
        INFINITY => Some(f64::INFINITY),
        NEG_INFINITY => Some(f64::NEG_INFINITY),
        _ => None,
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}
impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}
impl From<i64> for ParamValue {
    fn from(n: i64) -> Self {
        Self::Long(n)
    }
}
impl From<f64> for ParamValue {
    fn from(x: f64) -> Self {
        Self::Double(x)
    }
}
impl From<DateTime<Utc>> for ParamValue {
    fn from(d: DateTime<Utc>) -> Self {
        Self::Date(d)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobParameter {
    pub value: ParamValue,
    pub identifying: bool,
}

impl JobParameter {
    pub fn identifying(value: impl Into<ParamValue>) -> Self {
        Self { value: value.into(),
               identifying: true }
    }

    pub fn non_identifying(value: impl Into<ParamValue>) -> Self {
        Self { value: value.into(),
               identifying: false }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobParameters {
    entries: IndexMap<String, JobParameter>,
}

impl JobParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> JobParametersBuilder {
        JobParametersBuilder::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, parameter: JobParameter) {
        self.entries.insert(name.into(), parameter);
    }

    pub fn get(&self, name: &str) -> Option<&JobParameter> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &JobParameter)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Subconjunto identificador (orden de inserción conservado).
    pub fn identifying(&self) -> JobParameters {
        let entries = self.entries
                          .iter()
                          .filter(|(_, p)| p.identifying)
                          .map(|(k, p)| (k.clone(), p.clone()))
                          .collect();
        JobParameters { entries }
    }

    pub fn has_identifying(&self) -> bool {
        self.entries.values().any(|p| p.identifying)
    }

    /// Digest determinista del subconjunto identificador.
    ///
    /// Se construye `{nombre: {TAG: valor}}` sólo con entradas identificadoras,
    /// se canonicaliza (claves ordenadas) y se hashea. Dos conjuntos que
    /// difieren sólo en entradas no identificadoras producen la misma clave.
    pub fn job_key(&self) -> String {
        let mut map = Map::new();
        for (name, p) in self.entries.iter().filter(|(_, p)| p.identifying) {
            let mut tagged = Map::new();
            tagged.insert(p.value.type_tag().to_string(), p.value.to_json());
            map.insert(name.clone(), Value::Object(tagged));
        }
        canonical_digest(&Value::Object(map))
    }
}

/// Builder ergonómico para `JobParameters`.
#[derive(Debug, Default)]
pub struct JobParametersBuilder {
    params: JobParameters,
}

impl JobParametersBuilder {
    pub fn add(mut self, name: impl Into<String>, parameter: JobParameter) -> Self {
        self.params.insert(name, parameter);
        self
    }

    pub fn add_string(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add(name, JobParameter::identifying(ParamValue::String(value.into())))
    }

    pub fn add_string_non_identifying(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add(name, JobParameter::non_identifying(ParamValue::String(value.into())))
    }

    pub fn add_date(self, name: impl Into<String>, value: DateTime<Utc>) -> Self {
        self.add(name, JobParameter::identifying(value))
    }

    pub fn add_date_non_identifying(self, name: impl Into<String>, value: DateTime<Utc>) -> Self {
        self.add(name, JobParameter::non_identifying(value))
    }

    pub fn add_long(self, name: impl Into<String>, value: i64) -> Self {
        self.add(name, JobParameter::identifying(value))
    }

    pub fn add_long_non_identifying(self, name: impl Into<String>, value: i64) -> Self {
        self.add(name, JobParameter::non_identifying(value))
    }

    pub fn add_double(self, name: impl Into<String>, value: f64) -> Self {
        self.add(name, JobParameter::identifying(value))
    }

    pub fn add_double_non_identifying(self, name: impl Into<String>, value: f64) -> Self {
        self.add(name, JobParameter::non_identifying(value))
    }

    pub fn build(self) -> JobParameters {
        self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 2, d, 0, 0, 0).single().expect("valid date")
    }

    #[test]
    fn non_identifying_entries_do_not_change_key() {
        let p1 = JobParameters::builder().add_date("date", day(19))
                                         .add_long_non_identifying("run.id", 1)
                                         .add_string_non_identifying("note", "first")
                                         .build();
        let p2 = JobParameters::builder().add_string_non_identifying("note", "second")
                                         .add_date("date", day(19))
                                         .add_long_non_identifying("run.id", 2)
                                         .add_double_non_identifying("ratio", 0.5)
                                         .build();
        assert_eq!(p1.job_key(), p2.job_key());
        assert_eq!(p1.job_key(), p1.identifying().job_key());
    }

    #[test]
    fn identifying_entries_change_key() {
        let a = JobParameters::builder().add_date("date", day(19)).build();
        let b = JobParameters::builder().add_date("date", day(20)).build();
        assert_ne!(a.job_key(), b.job_key());
    }

    #[test]
    fn insertion_order_is_irrelevant_for_key() {
        let a = JobParameters::builder().add_string("a", "1").add_long("b", 2).build();
        let b = JobParameters::builder().add_long("b", 2).add_string("a", "1").build();
        assert_eq!(a.job_key(), b.job_key());
    }

    #[test]
    fn type_participates_in_key() {
        let as_string = JobParameters::builder().add_string("n", "5").build();
        let as_long = JobParameters::builder().add_long("n", 5).build();
        assert_ne!(as_string.job_key(), as_long.job_key());
    }

    #[test]
    fn empty_identifying_set_has_stable_key() {
        let only_transient = JobParameters::builder().add_long_non_identifying("run.id", 9).build();
        assert!(!only_transient.has_identifying());
        assert_eq!(only_transient.job_key(), JobParameters::new().job_key());
        assert_eq!(JobParameters::new().job_key().len(), 64);
    }

    #[test]
    fn tagged_values_roundtrip() {
        for v in [ParamValue::from("x"), ParamValue::from(day(1)), ParamValue::from(-3i64), ParamValue::from(2.25)] {
            assert_eq!(ParamValue::from_tagged(v.type_tag(), &v.to_json()), Some(v.clone()));
        }
        assert_eq!(ParamValue::from_tagged("LONG", &Value::from("nope")), None);
        assert_eq!(ParamValue::from_tagged("BOOLEAN", &Value::from(true)), None);
    }

    #[test]
    fn non_finite_doubles_have_distinct_keys() {
        let key = |x: f64| JobParameters::builder().add_double("ratio", x).build().job_key();
        let keys = [key(f64::NAN), key(f64::INFINITY), key(f64::NEG_INFINITY), key(1.0)];
        for (i, a) in keys.iter().enumerate() {
            for b in &keys[i + 1..] {
                assert_ne!(a, b);
            }
        }
        let as_string = JobParameters::builder().add_string("ratio", "NaN").build();
        assert_ne!(as_string.job_key(), key(f64::NAN));
    }

    #[test]
    fn non_finite_doubles_roundtrip() {
        for x in [f64::INFINITY, f64::NEG_INFINITY] {
            let v = ParamValue::Double(x);
            assert_eq!(ParamValue::from_tagged("DOUBLE", &v.to_json()), Some(v));
        }
        match ParamValue::from_tagged("DOUBLE", &ParamValue::Double(f64::NAN).to_json()) {
            Some(ParamValue::Double(x)) => assert!(x.is_nan()),
            other => panic!("NaN debe decodificarse, obtuve {other:?}"),
        }
        assert_eq!(ParamValue::from_tagged("DOUBLE", &Value::from("inf")), None);
    }
}

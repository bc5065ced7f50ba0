//! Vocabulario de consulta acotado que un backend debe soportar. No es un
//! lenguaje de consultas general: sólo las formas que usan el repositorio y el
//! lector de historial.

/// Selección de registros de la colección de ejecuciones. El resultado se
/// ordena siempre por `executionId` descendente (placeholders al final).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordFilter {
    /// Todos los registros (placeholder incluido) de una identidad de instancia.
    JobKey { job_name: String, job_key: String },
    ExecutionId(i64),
    /// Registros de una instancia (placeholder incluido).
    InstanceId(i64),
    /// Ejecuciones con `startTime` presente y `endTime` ausente.
    Running { job_name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    pub filter: RecordFilter,
    pub limit: Option<usize>,
}

impl RecordQuery {
    pub fn new(filter: RecordFilter) -> Self {
        Self { filter, limit: None }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Patrón de nombre con comodines `*` o `%`. Coincide si los segmentos
/// literales aparecen en orden en cualquier posición del nombre (búsqueda por
/// subcadena, sin anclas).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePattern {
    segments: Vec<String>,
}

impl NamePattern {
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn matches(&self, name: &str) -> bool {
        let mut rest = name;
        for seg in &self.segments {
            match rest.find(seg.as_str()) {
                Some(pos) => rest = &rest[pos + seg.len()..],
                None => return false,
            }
        }
        true
    }

    /// Patrón SQL `LIKE` equivalente (escape con `\`).
    pub fn to_like(&self) -> String {
        let mut out = String::from("%");
        for seg in &self.segments {
            for c in seg.chars() {
                if matches!(c, '%' | '_' | '\\') {
                    out.push('\\');
                }
                out.push(c);
            }
            out.push('%');
        }
        out
    }
}

/// Criterio de nombre de job para consultas agrupadas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameMatch {
    Exact(String),
    Pattern(NamePattern),
}

impl NameMatch {
    /// Traduce un patrón tipo glob. Sin comodines se busca el nombre exacto.
    pub fn from_glob(pattern: &str) -> Self {
        if !pattern.contains(['*', '%']) {
            return Self::Exact(pattern.to_string());
        }
        let segments = pattern.split(['*', '%'])
                              .filter(|s| !s.is_empty())
                              .map(str::to_string)
                              .collect();
        Self::Pattern(NamePattern { segments })
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Exact(expected) => expected == name,
            Self::Pattern(p) => p.matches(name),
        }
    }
}

/// Listado paginado de instancias agrupadas por `instanceId`, orden
/// descendente.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceQuery {
    pub name: NameMatch,
    pub start: usize,
    pub count: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_translation() {
        assert_eq!(NameMatch::from_glob("ReportJob"), NameMatch::Exact("ReportJob".into()));
        let m = NameMatch::from_glob("Rep*Job");
        assert!(m.matches("ReportJob"));
        assert!(m.matches("DailyReportJobV2"));
        assert!(!m.matches("JobReport"));
        let any = NameMatch::from_glob("%");
        assert!(any.matches("whatever"));
    }

    #[test]
    fn like_escapes_literals() {
        let NameMatch::Pattern(p) = NameMatch::from_glob("a_b*c") else {
            panic!("expected pattern");
        };
        assert_eq!(p.to_like(), "%a\\_b%c%");
    }
}

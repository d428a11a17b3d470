use std::fmt;

/// Максимальная длина имени принципала.
pub const ANAME_SZ: usize = 40;
/// Максимальная длина инстанса.
pub const INST_SZ: usize = 40;
/// Максимальная длина realm.
pub const REALM_SZ: usize = 40;

/// Размер буфера канонической формы `"name.inst@realm"`: три поля, два
/// разделителя и терминатор.
pub const MAX_PRINCIPAL_SIZE: usize = ANAME_SZ + INST_SZ + REALM_SZ + 3;
/// Максимальная длина канонической строки в байтах (без терминатора).
pub const MAX_CANONICAL_LEN: usize = MAX_PRINCIPAL_SIZE - 1;

pub const INST_SEP: char = '.';
pub const REALM_SEP: char = '@';

/// Запись ACL, разрешающая любого принципала любого realm.
pub const CATCH_ALL: &str = "*.*@*";

/// Realm по умолчанию, если в конфигурации не задан другой.
pub const DEFAULT_LOCAL_REALM: &str = "ATHENA.MIT.EDU";

/// Принципал в канонической форме `name.instance@realm`.
///
/// Получить значение можно только через [`canonicalize`] (или
/// [`Canonicalizer`]), поэтому длина строки никогда не превышает
/// [`MAX_CANONICAL_LEN`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalPrincipal(String);

/// Принципал, разложенный на поля.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub name: String,
    pub instance: String,
    pub realm: String,
}

/// Канонизатор, знающий локальный realm.
#[derive(Debug, Clone)]
pub struct Canonicalizer {
    local_realm: String,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl CanonicalPrincipal {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Имя: всё до первого `.`.
    pub fn name(&self) -> &str {
        match self.0.find(INST_SEP) {
            Some(dot) => &self.0[..dot],
            None => &self.0,
        }
    }

    /// Хвост `@realm` (вместе с разделителем), начиная с первого `@`.
    ///
    /// `None` бывает только у строк, которые прошли быстрый путь и были
    /// обрезаны до [`MAX_CANONICAL_LEN`] раньше, чем встретился `@`.
    pub fn realm_suffix(&self) -> Option<&str> {
        self.0.find(REALM_SEP).map(|at| &self.0[at..])
    }

    /// Шаблоны для подстановочного поиска в порядке приоритета:
    /// `name.*@realm`, `*.*@realm`, `*.*@*`.
    pub fn wildcard_probes(&self) -> Vec<String> {
        let mut probes = Vec::with_capacity(3);
        if let Some(realm) = self.realm_suffix() {
            probes.push(format!("{}.*{realm}", self.name()));
            probes.push(format!("*.*{realm}"));
        }
        probes.push(CATCH_ALL.to_string());
        probes
    }

    /// Раскладывает строку на поля по первому `.` и следующему за ним `@`.
    pub fn to_principal(&self) -> Principal {
        let s = self.0.as_str();
        let (name, rest) = match s.find(INST_SEP) {
            Some(dot) => (&s[..dot], &s[dot + 1..]),
            None => (s, ""),
        };
        let (instance, realm) = match rest.find(REALM_SEP) {
            Some(at) => (&rest[..at], &rest[at + 1..]),
            None => (rest, ""),
        };
        Principal {
            name: name.to_string(),
            instance: instance.to_string(),
            realm: realm.to_string(),
        }
    }
}

impl Canonicalizer {
    pub fn new(local_realm: impl Into<String>) -> Self {
        Self {
            local_realm: local_realm.into(),
        }
    }

    pub fn local_realm(&self) -> &str {
        &self.local_realm
    }

    pub fn canonicalize(
        &self,
        raw: &str,
    ) -> Option<CanonicalPrincipal> {
        canonicalize(raw, &self.local_realm)
    }
}

impl Default for Canonicalizer {
    fn default() -> Self {
        Self::new(DEFAULT_LOCAL_REALM)
    }
}

impl fmt::Display for CanonicalPrincipal {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalPrincipal {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(
            f,
            "{}{INST_SEP}{}{REALM_SEP}{}",
            self.name, self.instance, self.realm
        )
    }
}

////////////////////////////////////////////////////////////////////////////////
// Канонизация
////////////////////////////////////////////////////////////////////////////////

/// Приводит имя принципала к виду `name.instance@realm`.
///
/// Отсутствующий инстанс становится пустой строкой, отсутствующий realm
/// заменяется на `local_realm`.
///
/// Если строка уже содержит `.` раньше `@`, она считается канонической и
/// копируется как есть (с обрезкой до [`MAX_CANONICAL_LEN`] байт): длины
/// отдельных полей в этом случае не проверяются. Иначе строка разбирается
/// по полям, каждое обрезается до своего максимума, а если поле не влезает
/// в общий бюджет, результат целиком `None`.
///
/// Пустой вход и пустое имя дают `None`.
pub fn canonicalize(
    raw: &str,
    local_realm: &str,
) -> Option<CanonicalPrincipal> {
    if raw.is_empty() {
        return None;
    }

    let at = raw.find(REALM_SEP);
    let dot = match (raw.find(INST_SEP), at) {
        (Some(dot), Some(at)) if dot < at => {
            let verbatim = truncate_on_char_boundary(raw, MAX_CANONICAL_LEN);
            return Some(CanonicalPrincipal(verbatim.to_string()));
        }
        // Точка после `@` относится к realm.
        (Some(_), Some(_)) => None,
        (dot, _) => dot,
    };

    let end = raw.len();
    let mut canon = String::with_capacity(MAX_PRINCIPAL_SIZE);

    let name = truncate_on_char_boundary(&raw[..dot.or(at).unwrap_or(end)], ANAME_SZ);
    if name.is_empty() {
        return None;
    }
    push_field(&mut canon, name, 0)?;
    push_field(&mut canon, &INST_SEP.to_string(), 0)?;

    if let Some(dot) = dot {
        let instance = &raw[dot + 1..at.unwrap_or(end)];
        push_field(&mut canon, truncate_on_char_boundary(instance, INST_SZ), 0)?;
    }

    canon.push(REALM_SEP);

    let realm = match at {
        Some(at) => truncate_on_char_boundary(&raw[at + 1..], REALM_SZ),
        None => local_realm,
    };
    // Ещё один байт резервируется под терминатор.
    push_field(&mut canon, realm, 1)?;

    Some(CanonicalPrincipal(canon))
}

/// Дописывает `field`, если после этого (плюс `reserve` байт) длина строго
/// меньше [`MAX_PRINCIPAL_SIZE`].
fn push_field(
    canon: &mut String,
    field: &str,
    reserve: usize,
) -> Option<()> {
    if canon.len() + field.len() + reserve < MAX_PRINCIPAL_SIZE {
        canon.push_str(field);
        Some(())
    } else {
        None
    }
}

/// Обрезает строку до `max` байт, не разрывая UTF-8 последовательности.
fn truncate_on_char_boundary(
    s: &str,
    max: usize,
) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Начальная ёмкость таблицы: вдвое больше типичного размера ACL.
pub const ACL_LEN: usize = 16;

/// Множество записей ACL на открытой адресации с линейным пробированием.
///
/// **ИНВАРИАНТЫ:**
///
/// - `entries <= size / 2` после каждой вставки;
/// - каждая строка хранится не более одного раза;
/// - цепочка пробирования от `hashval(key) % size` до ключа не содержит
///   пустых слотов (удаления нет, поэтому цепочки не рвутся).
///
/// Порядок итерации: порядок бакетов, он меняется при росте таблицы и
/// ничего не гарантирует.
#[derive(Debug, Clone)]
pub struct AclSet {
    tbl: Vec<Option<String>>,
    entries: usize,
}

/// Итератор по записям в порядке бакетов.
pub struct Iter<'a> {
    inner: std::slice::Iter<'a, Option<String>>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl AclSet {
    /// Создаёт пустое множество ёмкостью [`ACL_LEN`].
    pub fn new() -> Self {
        Self::with_capacity(ACL_LEN)
    }

    /// Создаёт пустое множество на `size` бакетов (минимум один).
    pub fn with_capacity(size: usize) -> Self {
        let size = size.max(1);
        let mut tbl = Vec::with_capacity(size);
        tbl.resize_with(size, || None);
        Self { tbl, entries: 0 }
    }

    /// Количество записей.
    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Текущее количество бакетов.
    pub fn capacity(&self) -> usize {
        self.tbl.len()
    }

    /// Добавляет копию `el`. Возвращает `false`, если такая строка уже есть.
    pub fn insert(
        &mut self,
        el: &str,
    ) -> bool {
        if self.entries + 1 > self.tbl.len() >> 1 {
            self.grow();
        }

        let size = self.tbl.len();
        let mut hv = hashval(el) as usize % size;
        while let Some(existing) = &self.tbl[hv] {
            if existing == el {
                return false;
            }
            hv = (hv + 1) % size;
        }

        self.tbl[hv] = Some(el.to_owned());
        self.entries += 1;
        true
    }

    /// Проверяет, содержится ли `el` в множестве.
    pub fn contains(
        &self,
        el: &str,
    ) -> bool {
        let size = self.tbl.len();
        let mut hv = hashval(el) as usize % size;
        while let Some(existing) = &self.tbl[hv] {
            if existing == el {
                return true;
            }
            hv = (hv + 1) % size;
        }
        false
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.tbl.iter(),
        }
    }

    /// Удваивает таблицу и заново раскладывает записи по новому модулю.
    fn grow(&mut self) {
        let new_size = self.tbl.len() << 1;
        let mut new_tbl: Vec<Option<String>> = Vec::with_capacity(new_size);
        new_tbl.resize_with(new_size, || None);

        for el in self.tbl.drain(..).flatten() {
            let mut hv = hashval(&el) as usize % new_size;
            while new_tbl[hv].is_some() {
                hv = (hv + 1) % new_size;
            }
            new_tbl[hv] = Some(el);
        }

        self.tbl = new_tbl;
    }
}

/// Хеш строки: `hv ^= (hv << 3) ^ byte` по всем байтам.
///
/// Влияет только на порядок пробирования, а не на корректность.
pub fn hashval(s: &str) -> u32 {
    s.bytes()
        .fold(0u32, |hv, b| hv ^ (hv.wrapping_shl(3) ^ u32::from(b)))
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl Default for AclSet {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.find_map(|slot| slot.as_deref())
    }
}

impl<'a> IntoIterator for &'a AclSet {
    type Item = &'a str;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<S: AsRef<str>> FromIterator<S> for AclSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = AclSet::new();
        for el in iter {
            set.insert(el.as_ref());
        }
        set
    }
}

impl<S: AsRef<str>> Extend<S> for AclSet {
    fn extend<I: IntoIterator<Item = S>>(
        &mut self,
        iter: I,
    ) {
        for el in iter {
            self.insert(el.as_ref());
        }
    }
}

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// 容量有界的最近最少使用 (LRU) 缓存.
///
/// 容量为 0 时不缓存任何内容. 该结构本身不是线程安全的,
/// 需要共享时由调用方加锁.
#[derive(Debug)]
pub struct BoundedCache<K, V> {
    capacity: usize,
    entries: HashMap<K, (V, u64)>,
    /// 访问序号 -> 键. 序号最小者最久未被使用.
    order: BTreeMap<u64, K>,
    tick: u64,
}

impl<K: Clone + Eq + Hash, V: Clone> BoundedCache<K, V> {
    /// 创建容量为 `capacity` 的空缓存.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity.min(1024)),
            order: BTreeMap::new(),
            tick: 0,
        }
    }

    #[inline]
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// 查询并刷新该键的访问时间.
    pub fn get(&mut self, key: &K) -> Option<V> {
        let tick = self.next_tick();
        let (value, last) = self.entries.get_mut(key)?;
        let old = std::mem::replace(last, tick);
        let value = value.clone();
        if let Some(k) = self.order.remove(&old) {
            self.order.insert(tick, k);
        }
        Some(value)
    }

    /// 插入 (或覆盖) 一个条目. 超出容量时淘汰最久未使用的条目.
    pub fn insert(&mut self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }
        let tick = self.next_tick();
        if let Some((_, old)) = self.entries.insert(key.clone(), (value, tick)) {
            self.order.remove(&old);
        }
        self.order.insert(tick, key);
        while self.entries.len() > self.capacity {
            let Some((_, oldest)) = self.order.pop_first() else {
                break;
            };
            self.entries.remove(&oldest);
        }
    }

    /// 是否包含该键. 不刷新访问时间.
    #[inline]
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// 当前条目数.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 容量上限.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 清空.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

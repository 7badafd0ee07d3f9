use std::collections::BTreeMap;

use async_trait::async_trait;

use super::{ExecutorRouteStrategy, RouteDecision};

/// 每个地址的虚拟节点数
const VIRTUAL_NODE_NUM: usize = 100;

/// 一致性哈希：同一任务在地址列表不变时总是路由到同一台机器，
/// 地址增减时只有少部分任务迁移
pub struct ConsistentHashStrategy;

impl ConsistentHashStrategy {
    /// MD5 摘要前4字节按小端序组成的32位无符号整数
    pub fn hash(key: &str) -> u64 {
        let digest = md5::compute(key.as_bytes()).0;
        u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]) as u64
    }

    pub fn select<'a>(job_id: i64, addresses: &'a [String]) -> Option<&'a String> {
        let mut ring: BTreeMap<u64, &String> = BTreeMap::new();
        for address in addresses {
            for i in 0..VIRTUAL_NODE_NUM {
                let node_hash = Self::hash(&format!("SHARD-{address}-NODE-{i}"));
                ring.insert(node_hash, address);
            }
        }

        let job_hash = Self::hash(&job_id.to_string());
        ring.range(job_hash..)
            .next()
            .or_else(|| ring.iter().next())
            .map(|(_, address)| *address)
    }
}

#[async_trait]
impl ExecutorRouteStrategy for ConsistentHashStrategy {
    async fn route(&self, job_id: i64, addresses: &[String]) -> RouteDecision {
        match Self::select(job_id, addresses) {
            Some(address) => RouteDecision::selected(address.clone()),
            None => RouteDecision::rejected("执行器地址为空"),
        }
    }

    fn name(&self) -> &str {
        "ConsistentHash"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("http://10.0.0.{i}:9999/")).collect()
    }

    #[test]
    fn test_hash_is_md5_prefix_little_endian() {
        // md5("") = d41d8cd98f00b204e9800998ecf8427e
        assert_eq!(ConsistentHashStrategy::hash(""), 0xd98c1dd4);
    }

    #[test]
    fn test_stable_for_same_inputs() {
        let addresses = nodes(3);
        for job_id in 0..50 {
            let a = ConsistentHashStrategy::select(job_id, &addresses);
            let b = ConsistentHashStrategy::select(job_id, &addresses);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_adding_address_moves_jobs_only_to_new_address() {
        let before = nodes(3);
        let after = nodes(4);
        let added = &after[3];

        let total = 1000;
        let mut moved = 0;
        for job_id in 0..total {
            let old = ConsistentHashStrategy::select(job_id, &before).unwrap();
            let new = ConsistentHashStrategy::select(job_id, &after).unwrap();
            if old != new {
                moved += 1;
                assert_eq!(new, added);
            }
        }

        assert!(moved > 0);
        assert!(moved < total / 2, "moved {moved} of {total}");
    }
}

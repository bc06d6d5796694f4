//! NUMA 放置
//!
//! 将调用线程绑定到指定 NUMA 节点，并查询节点本地的 CPU 集合。
//!
//! ## 拓扑来源
//! - **Linux**: 解析 sysfs（`/sys/devices/system/node/`）
//! - **其他平台**: 回退到单节点拓扑，标记为不可用
//!
//! NUMA 不可用时，绑定操作只记录一次警告并直接返回，放置结果不作保证；
//! 调用者应将放置视为性能优化，而不是正确性前提。
//!
//! ## 示例
//!
//! ```rust,no_run
//! use nvm_osal::NumaPlacement;
//!
//! let placement = NumaPlacement::detect();
//! let cpus = placement.get_cpu_per_node(0);
//! println!("node 0 has {} local CPUs", cpus.count());
//!
//! placement.bind_node(0)?;
//! // 在节点 0 上访问内存区域...
//! placement.unbind_node()?;
//! # Ok::<(), nvm_osal::OsalError>(())
//! ```

use std::path::Path;
use std::sync::Once;

use crate::error::{OsalError, OsalResult};

const SYSFS_NODE_ROOT: &str = "/sys/devices/system/node";

// ============================================================================
// CPU 掩码
// ============================================================================

/// 逻辑 CPU 位图
///
/// 独占所有权，不实现 `Clone`：转移即移动，底层存储只释放一次。
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CpuMask {
    words: Vec<u64>,
}

impl CpuMask {
    /// 创建空掩码
    pub fn new() -> Self {
        Self::default()
    }

    /// 由 CPU 编号集合创建掩码
    pub fn from_cpus(cpus: impl IntoIterator<Item = usize>) -> Self {
        let mut mask = Self::new();
        for cpu in cpus {
            mask.set(cpu);
        }
        mask
    }

    /// 解析内核 cpulist 格式，如 `0-3,8,10-11`
    ///
    /// 无法解析的片段被忽略。
    pub fn parse_cpulist(list: &str) -> Self {
        let mut mask = Self::new();
        for part in list.trim().split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.split_once('-') {
                Some((lo, hi)) => {
                    if let (Ok(lo), Ok(hi)) = (lo.parse::<usize>(), hi.parse::<usize>()) {
                        for cpu in lo..=hi {
                            mask.set(cpu);
                        }
                    }
                }
                None => {
                    if let Ok(cpu) = part.parse::<usize>() {
                        mask.set(cpu);
                    }
                }
            }
        }
        mask
    }

    pub fn set(&mut self, cpu: usize) {
        let word = cpu / 64;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1u64 << (cpu % 64);
    }

    pub fn clear(&mut self, cpu: usize) {
        if let Some(word) = self.words.get_mut(cpu / 64) {
            *word &= !(1u64 << (cpu % 64));
        }
    }

    pub fn is_set(&self, cpu: usize) -> bool {
        self.words
            .get(cpu / 64)
            .is_some_and(|word| word & (1u64 << (cpu % 64)) != 0)
    }

    /// 已置位的 CPU 数量
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// 按升序遍历已置位的 CPU
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(idx, &word)| {
            (0..64)
                .filter(move |bit| word & (1u64 << bit) != 0)
                .map(move |bit| idx * 64 + bit)
        })
    }

    /// 是否为 `other` 的子集
    pub fn is_subset_of(&self, other: &CpuMask) -> bool {
        self.iter().all(|cpu| other.is_set(cpu))
    }

    #[cfg(target_os = "linux")]
    pub(crate) fn to_cpu_set(&self) -> libc::cpu_set_t {
        let max = 8 * std::mem::size_of::<libc::cpu_set_t>();
        let mut set: libc::cpu_set_t = unsafe { std::mem::zeroed() };
        unsafe { libc::CPU_ZERO(&mut set) };
        for cpu in self.iter().take_while(|&cpu| cpu < max) {
            unsafe { libc::CPU_SET(cpu, &mut set) };
        }
        set
    }

    #[cfg(target_os = "linux")]
    pub(crate) fn from_cpu_set(set: &libc::cpu_set_t) -> Self {
        let max = 8 * std::mem::size_of::<libc::cpu_set_t>();
        Self::from_cpus((0..max).filter(|&cpu| unsafe { libc::CPU_ISSET(cpu, set) }))
    }
}

impl FromIterator<usize> for CpuMask {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self::from_cpus(iter)
    }
}

// ============================================================================
// 拓扑
// ============================================================================

/// NUMA 节点信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumaNodeInfo {
    /// 节点 ID
    pub node_id: usize,
    /// 本地 CPU（升序）
    pub cpus: Vec<usize>,
    /// 总内存大小（字节），未知时为 0
    pub total_memory: u64,
}

/// 系统 NUMA 拓扑快照
#[derive(Debug, Clone)]
pub struct NumaTopology {
    /// 节点列表，按节点 ID 升序；ID 可能不连续
    nodes: Vec<NumaNodeInfo>,
    /// 拓扑是否来自操作系统
    available: bool,
}

impl NumaTopology {
    /// 检测系统拓扑
    ///
    /// 从不失败：检测不到时回退到单节点拓扑并标记为不可用。
    pub fn detect() -> Self {
        #[cfg(target_os = "linux")]
        {
            match Self::from_sysfs(Path::new(SYSFS_NODE_ROOT)) {
                Ok(topology) => return topology,
                Err(e) => log::debug!("sysfs NUMA detection failed: {}", e),
            }
        }

        Self::single_node_fallback()
    }

    /// 解析 sysfs 风格的节点目录（`<root>/node<N>/{cpulist,meminfo}`）
    pub fn from_sysfs(root: &Path) -> OsalResult<Self> {
        let entries = std::fs::read_dir(root)
            .map_err(|e| OsalError::Topology(format!("cannot read {}: {e}", root.display())))?;

        let mut node_ids: Vec<usize> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name();
                name.to_str()?.strip_prefix("node")?.parse::<usize>().ok()
            })
            .collect();

        if node_ids.is_empty() {
            return Err(OsalError::Topology(format!(
                "no NUMA nodes under {}",
                root.display()
            )));
        }
        node_ids.sort_unstable();

        let nodes = node_ids
            .into_iter()
            .map(|node_id| {
                let node_dir = root.join(format!("node{node_id}"));
                let cpus = std::fs::read_to_string(node_dir.join("cpulist"))
                    .map(|list| CpuMask::parse_cpulist(&list).iter().collect())
                    .unwrap_or_default();
                let total_memory = std::fs::read_to_string(node_dir.join("meminfo"))
                    .map(|info| parse_meminfo_total(&info))
                    .unwrap_or(0);
                NumaNodeInfo {
                    node_id,
                    cpus,
                    total_memory,
                }
            })
            .collect();

        Ok(Self {
            nodes,
            available: true,
        })
    }

    /// 单节点回退拓扑：所有 CPU 归属节点 0
    pub fn single_node_fallback() -> Self {
        Self {
            nodes: vec![NumaNodeInfo {
                node_id: 0,
                cpus: (0..num_cpus::get()).collect(),
                total_memory: 0,
            }],
            available: false,
        }
    }

    /// 拓扑是否来自操作系统
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// 节点数量
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// 最大节点 ID
    pub fn max_node(&self) -> Option<usize> {
        self.nodes.last().map(|n| n.node_id)
    }

    pub fn nodes(&self) -> &[NumaNodeInfo] {
        &self.nodes
    }

    /// 获取指定节点的信息
    pub fn node(&self, node_id: usize) -> Option<&NumaNodeInfo> {
        self.nodes.iter().find(|n| n.node_id == node_id)
    }

    /// CPU 所属节点
    pub fn node_of_cpu(&self, cpu: usize) -> Option<usize> {
        self.nodes
            .iter()
            .find(|n| n.cpus.contains(&cpu))
            .map(|n| n.node_id)
    }

    /// 节点本地 CPU 掩码；节点不存在时为空
    pub fn cpus_of_node(&self, node_id: usize) -> CpuMask {
        self.node(node_id)
            .map(|n| n.cpus.iter().copied().collect())
            .unwrap_or_default()
    }

    /// 节点内存大小（字节）
    pub fn memory_of_node(&self, node_id: usize) -> Option<u64> {
        self.node(node_id).map(|n| n.total_memory)
    }

    /// 所有节点 CPU 的并集
    pub fn online_cpus(&self) -> CpuMask {
        self.nodes
            .iter()
            .flat_map(|n| n.cpus.iter().copied())
            .collect()
    }
}

/// 解析 `Node N MemTotal:  16384000 kB`
fn parse_meminfo_total(meminfo: &str) -> u64 {
    meminfo
        .lines()
        .find_map(|line| {
            let (_, rest) = line.split_once("MemTotal:")?;
            let kb = rest.split_whitespace().next()?.parse::<u64>().ok()?;
            Some(kb * 1024)
        })
        .unwrap_or(0)
}

// ============================================================================
// 放置
// ============================================================================

/// 线程 NUMA 放置
///
/// 所有操作作用于调用线程，同步执行。
#[derive(Debug, Clone)]
pub struct NumaPlacement {
    topology: NumaTopology,
}

impl NumaPlacement {
    /// 基于检测到的系统拓扑创建
    pub fn detect() -> Self {
        Self::with_topology(NumaTopology::detect())
    }

    pub fn with_topology(topology: NumaTopology) -> Self {
        Self { topology }
    }

    pub fn topology(&self) -> &NumaTopology {
        &self.topology
    }

    pub fn is_available(&self) -> bool {
        self.topology.is_available()
    }

    /// 最大可用节点 ID
    pub fn max_numa_node(&self) -> Option<usize> {
        self.topology.max_node()
    }

    /// 节点本地的 CPU 集合
    pub fn get_cpu_per_node(&self, node_id: usize) -> CpuMask {
        self.topology.cpus_of_node(node_id)
    }

    /// 调用线程当前所在节点
    pub fn current_node(&self) -> Option<usize> {
        crate::current_cpu().and_then(|cpu| self.topology.node_of_cpu(cpu))
    }

    /// 将调用线程的调度与首选内存分配绑定到节点
    ///
    /// 持续到 [`unbind_node`](Self::unbind_node) 或线程退出。没有本地 CPU 的节点
    /// （如持久内存、CXL 内存节点）只设置首选内存策略，不改变 CPU 亲和性。
    pub fn bind_node(&self, node_id: usize) -> OsalResult<()> {
        self.bind_node_with(node_id, set_memory_policy)
    }

    fn bind_node_with(
        &self,
        node_id: usize,
        set_policy: impl FnOnce(MemoryPolicy) -> OsalResult<()>,
    ) -> OsalResult<()> {
        if !self.numa_available_warn() {
            return Ok(());
        }

        let node = self
            .topology
            .node(node_id)
            .ok_or(OsalError::InvalidNode { node: node_id })?;
        let cpus: CpuMask = node.cpus.iter().copied().collect();
        if cpus.is_empty() {
            log::debug!("NUMA node {} has no CPUs, keeping current affinity", node_id);
        }

        apply_placement(
            (!cpus.is_empty()).then_some(&cpus),
            MemoryPolicy::Preferred(node_id),
            set_policy,
        )?;

        log::debug!("bound thread to NUMA node {} ({} CPUs)", node_id, cpus.count());
        Ok(())
    }

    /// 解除绑定：允许在所有在线 CPU 上运行，恢复默认内存策略
    pub fn unbind_node(&self) -> OsalResult<()> {
        self.unbind_node_with(set_memory_policy)
    }

    fn unbind_node_with(
        &self,
        set_policy: impl FnOnce(MemoryPolicy) -> OsalResult<()>,
    ) -> OsalResult<()> {
        if !self.numa_available_warn() {
            return Ok(());
        }

        let online = self.topology.online_cpus();
        apply_placement(
            (!online.is_empty()).then_some(&online),
            MemoryPolicy::Default,
            set_policy,
        )?;

        log::debug!("unbound thread from NUMA placement");
        Ok(())
    }

    fn numa_available_warn(&self) -> bool {
        if self.topology.is_available() {
            return true;
        }
        static WARN_ONCE: Once = Once::new();
        WARN_ONCE.call_once(|| {
            log::warn!(
                "NUMA is not available in this system. Binding node may incur undefined results."
            );
        });
        false
    }
}

// ============================================================================
// 内存策略
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemoryPolicy {
    Default,
    Preferred(usize),
}

/// 先设置 CPU 亲和性，再设置内存策略
///
/// 内存策略失败时恢复原有亲和性，调用线程的放置保持不变。
fn apply_placement(
    cpus: Option<&CpuMask>,
    policy: MemoryPolicy,
    set_policy: impl FnOnce(MemoryPolicy) -> OsalResult<()>,
) -> OsalResult<()> {
    let previous = match cpus {
        Some(cpus) => {
            let previous = crate::thread_affinity().ok();
            crate::set_thread_affinity(cpus)?;
            previous
        }
        None => None,
    };

    if let Err(e) = set_policy(policy) {
        match previous {
            Some(previous) => {
                if let Err(restore) = crate::set_thread_affinity(&previous) {
                    log::warn!("failed to restore CPU affinity after {}: {}", e, restore);
                }
            }
            None if cpus.is_some() => {
                log::warn!("CPU affinity left changed after {}: previous mask unknown", e);
            }
            None => {}
        }
        return Err(e);
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn set_memory_policy(policy: MemoryPolicy) -> OsalResult<()> {
    // include/uapi/linux/mempolicy.h
    const MPOL_DEFAULT: libc::c_long = 0;
    const MPOL_PREFERRED: libc::c_long = 1;

    let ret = match policy {
        MemoryPolicy::Default => unsafe {
            libc::syscall(
                libc::SYS_set_mempolicy,
                MPOL_DEFAULT,
                std::ptr::null::<libc::c_ulong>(),
                0 as libc::c_ulong,
            )
        },
        MemoryPolicy::Preferred(node) => {
            let mut nodemask = vec![0 as libc::c_ulong; node / 64 + 1];
            nodemask[node / 64] |= (1 as libc::c_ulong) << (node % 64);
            // 内核读取 maxnode - 1 位
            let maxnode = (nodemask.len() * 64 + 1) as libc::c_ulong;
            unsafe {
                libc::syscall(
                    libc::SYS_set_mempolicy,
                    MPOL_PREFERRED,
                    nodemask.as_ptr(),
                    maxnode,
                )
            }
        }
    };

    if ret != 0 {
        return Err(OsalError::MemPolicy(std::io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn set_memory_policy(_policy: MemoryPolicy) -> OsalResult<()> {
    Err(OsalError::Unsupported(crate::host_os()))
}

// ============================================================================
// 测试
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fake_sysfs() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let node0 = dir.path().join("node0");
        let node1 = dir.path().join("node1");
        fs::create_dir(&node0).expect("mkdir node0");
        fs::create_dir(&node1).expect("mkdir node1");
        fs::write(node0.join("cpulist"), "0-3,8\n").expect("write cpulist");
        fs::write(node1.join("cpulist"), "4-7\n").expect("write cpulist");
        fs::write(
            node0.join("meminfo"),
            "Node 0 MemTotal:        8192 kB\nNode 0 MemFree:         4096 kB\n",
        )
        .expect("write meminfo");
        // 非节点目录应被忽略
        fs::create_dir(dir.path().join("power")).expect("mkdir power");
        fs::write(dir.path().join("possible"), "0-1\n").expect("write possible");
        dir
    }

    #[test]
    fn test_parse_cpulist() {
        let mask = CpuMask::parse_cpulist("0-3,8,10-11\n");
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![0, 1, 2, 3, 8, 10, 11]);
        assert_eq!(mask.count(), 7);

        assert!(CpuMask::parse_cpulist("").is_empty());
        assert!(CpuMask::parse_cpulist("\n").is_empty());
        assert_eq!(CpuMask::parse_cpulist("x,2").iter().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_cpu_mask_ops() {
        let mut mask = CpuMask::from_cpus([1, 64, 130]);
        assert!(mask.is_set(1));
        assert!(mask.is_set(64));
        assert!(mask.is_set(130));
        assert!(!mask.is_set(2));
        assert!(!mask.is_set(10_000));

        mask.clear(64);
        mask.clear(10_000);
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![1, 130]);

        let superset = CpuMask::from_cpus(0..200);
        assert!(mask.is_subset_of(&superset));
        assert!(!superset.is_subset_of(&mask));

        // 移动后由新所有者持有
        let moved = mask;
        assert_eq!(moved.count(), 2);
    }

    #[test]
    fn test_topology_from_sysfs() {
        let root = fake_sysfs();
        let topo = NumaTopology::from_sysfs(root.path()).expect("topology should parse");

        assert!(topo.is_available());
        assert_eq!(topo.node_count(), 2);
        assert_eq!(topo.max_node(), Some(1));
        assert_eq!(topo.node_of_cpu(8), Some(0));
        assert_eq!(topo.node_of_cpu(5), Some(1));
        assert_eq!(topo.node_of_cpu(99), None);
        assert_eq!(topo.memory_of_node(0), Some(8192 * 1024));
        assert_eq!(topo.memory_of_node(1), Some(0));
        assert_eq!(
            topo.cpus_of_node(0).iter().collect::<Vec<_>>(),
            vec![0, 1, 2, 3, 8]
        );
        assert!(topo.cpus_of_node(7).is_empty());
        assert_eq!(topo.online_cpus().count(), 9);
    }

    #[test]
    fn test_topology_missing_root() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let err = NumaTopology::from_sysfs(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, OsalError::Topology(_)));

        let err = NumaTopology::from_sysfs(dir.path()).unwrap_err();
        assert!(matches!(err, OsalError::Topology(_)));
    }

    #[test]
    fn test_single_node_fallback() {
        let topo = NumaTopology::single_node_fallback();
        assert!(!topo.is_available());
        assert_eq!(topo.node_count(), 1);
        assert_eq!(topo.cpus_of_node(0).count(), num_cpus::get());
    }

    #[test]
    fn test_detect_never_fails() {
        let topo = NumaTopology::detect();
        assert!(topo.node_count() >= 1);
        assert!(topo.max_node().is_some());
    }

    #[test]
    fn test_unavailable_placement_is_noop() {
        let _ = env_logger::builder().is_test(true).try_init();
        let placement = NumaPlacement::with_topology(NumaTopology::single_node_fallback());
        assert!(!placement.is_available());
        // 不可用时只告警，不报错，也不检查节点号
        placement.bind_node(0).expect("bind should degrade to a no-op");
        placement.bind_node(42).expect("bind should degrade to a no-op");
        placement.unbind_node().expect("unbind should degrade to a no-op");
    }

    #[test]
    fn test_invalid_node_rejected() {
        let root = fake_sysfs();
        let placement =
            NumaPlacement::with_topology(NumaTopology::from_sysfs(root.path()).expect("parse"));
        let err = placement.bind_node(5).unwrap_err();
        assert!(matches!(err, OsalError::InvalidNode { node: 5 }));
        assert_eq!(placement.max_numa_node(), Some(1));
        assert_eq!(placement.get_cpu_per_node(1).count(), 4);
    }

    /// node0 拥有给定 CPU，node1 没有 CPU（内存节点）
    #[cfg(target_os = "linux")]
    fn memory_only_sysfs(cpus: &[usize]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let node0 = dir.path().join("node0");
        let node1 = dir.path().join("node1");
        fs::create_dir(&node0).expect("mkdir node0");
        fs::create_dir(&node1).expect("mkdir node1");
        let cpulist = cpus.iter().map(ToString::to_string).collect::<Vec<_>>().join(",");
        fs::write(node0.join("cpulist"), cpulist).expect("write cpulist");
        fs::write(node1.join("cpulist"), "\n").expect("write cpulist");
        dir
    }

    #[cfg(target_os = "linux")]
    fn affinity_list() -> Vec<usize> {
        crate::thread_affinity()
            .expect("sched_getaffinity")
            .iter()
            .collect()
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_bind_cpuless_node_sets_policy_only() {
        std::thread::spawn(|| {
            let before = affinity_list();
            let root = memory_only_sysfs(&before[..1]);
            let placement =
                NumaPlacement::with_topology(NumaTopology::from_sysfs(root.path()).expect("parse"));
            assert!(placement.get_cpu_per_node(1).is_empty());

            let mut applied = None;
            placement
                .bind_node_with(1, |policy| {
                    applied = Some(policy);
                    Ok(())
                })
                .expect("binding a memory-only node");
            assert_eq!(applied, Some(MemoryPolicy::Preferred(1)));
            assert_eq!(affinity_list(), before);

            // 真实系统调用：节点 1 可能不存在，但不能因亲和性失败
            match placement.bind_node(1) {
                Ok(()) | Err(OsalError::MemPolicy(_)) => {}
                Err(e) => panic!("unexpected bind error: {e}"),
            }
            assert_eq!(affinity_list(), before);
        })
        .join()
        .expect("bind thread panicked");
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_failed_policy_restores_affinity() {
        std::thread::spawn(|| {
            let before = affinity_list();
            let denied = || -> OsalResult<()> {
                Err(OsalError::MemPolicy(std::io::Error::from_raw_os_error(libc::EPERM)))
            };

            // 绑定到只含第一个 CPU 的节点失败后，亲和性恢复为全部允许的 CPU
            let single = memory_only_sysfs(&before[..1]);
            let placement =
                NumaPlacement::with_topology(NumaTopology::from_sysfs(single.path()).expect("parse"));
            let err = placement.bind_node_with(0, |_| denied()).unwrap_err();
            assert!(matches!(err, OsalError::MemPolicy(_)));
            assert_eq!(affinity_list(), before);

            // 固定到单个 CPU 后解除绑定失败，保持固定状态
            let all = memory_only_sysfs(&before);
            let placement =
                NumaPlacement::with_topology(NumaTopology::from_sysfs(all.path()).expect("parse"));
            crate::set_thread_affinity(&CpuMask::from_cpus([before[0]])).expect("pin");
            let err = placement.unbind_node_with(|_| denied()).unwrap_err();
            assert!(matches!(err, OsalError::MemPolicy(_)));
            assert_eq!(affinity_list(), vec![before[0]]);

            crate::set_thread_affinity(&CpuMask::from_cpus(before.iter().copied()))
                .expect("restore affinity");
        })
        .join()
        .expect("placement thread panicked");
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_bind_current_host() {
        let placement = NumaPlacement::detect();
        let Some(node) = placement
            .topology()
            .nodes()
            .iter()
            .find(|n| !n.cpus.is_empty())
            .map(|n| n.node_id)
        else {
            return;
        };

        std::thread::spawn(move || {
            match placement.bind_node(node) {
                Ok(()) => {
                    if placement.is_available() {
                        let affinity = crate::thread_affinity().expect("sched_getaffinity");
                        assert!(affinity.is_subset_of(&placement.get_cpu_per_node(node)));
                    }
                }
                // 容器内可能禁止修改亲和性或内存策略
                Err(OsalError::Affinity(_) | OsalError::MemPolicy(_)) => return,
                Err(e) => panic!("unexpected bind error: {e}"),
            }

            match placement.unbind_node() {
                Ok(()) | Err(OsalError::Affinity(_) | OsalError::MemPolicy(_)) => {}
                Err(e) => panic!("unexpected unbind error: {e}"),
            }
        })
        .join()
        .expect("bind thread panicked");
    }
}

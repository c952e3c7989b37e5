use log::{debug, error, info, trace};
use std::io;

use crate::error::EngineError;

/// Load address and mapped size of a process's primary executable image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleInfo {
    pub base: usize,
    pub size: usize,
}

impl ModuleInfo {
    pub fn end(&self) -> usize {
        self.base.saturating_add(self.size)
    }
}

pub trait ProcessMemoryReader {
    fn attach(&mut self, pid: u32) -> io::Result<()>;
    fn read_memory(&self, address: usize, size: usize) -> io::Result<Vec<u8>>;
    fn detach(&mut self) -> io::Result<()>;
    fn is_attached(&self) -> bool;

    /// Address range of the attached process's main module.
    fn main_module(&self) -> io::Result<ModuleInfo>;

    /// False once the attached process has exited.
    fn is_alive(&self) -> bool;

    /// Read exactly `size` bytes. Anything that could not be read comes back as zeroes,
    /// so a failed or short read decodes as "no data" instead of aborting the poll.
    fn read_zeroed(&self, address: usize, size: usize) -> Vec<u8> {
        match self.read_memory(address, size) {
            Ok(mut data) => {
                if data.len() < size {
                    trace!(
                        "Short read at 0x{:X}: {} of {} bytes, zero-padding",
                        address,
                        data.len(),
                        size
                    );
                    data.resize(size, 0);
                }
                data
            }
            Err(source) => {
                let failure = EngineError::ReadFailure {
                    address,
                    length: size,
                    source,
                };
                debug!("{}, treating as zeroes", failure);
                vec![0u8; size]
            }
        }
    }
}

#[cfg(windows)]
mod windows_impl {
    use super::*;
    use windows::Win32::Foundation::{CloseHandle, HANDLE, HMODULE};
    use windows::Win32::System::Diagnostics::Debug::ReadProcessMemory;
    use windows::Win32::System::ProcessStatus::{
        EnumProcessModules, GetModuleInformation, MODULEINFO,
    };
    use windows::Win32::System::Threading::{
        GetExitCodeProcess, OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_VM_READ,
    };

    const STILL_ACTIVE: u32 = 259;

    pub struct WindowsMemoryReader {
        handle: Option<HANDLE>,
    }

    impl WindowsMemoryReader {
        pub fn new() -> Self {
            Self { handle: None }
        }

        fn handle(&self) -> io::Result<HANDLE> {
            self.handle
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "Not attached"))
        }
    }

    impl ProcessMemoryReader for WindowsMemoryReader {
        fn attach(&mut self, pid: u32) -> io::Result<()> {
            self.detach()?;
            info!("Opening process PID={} with PROCESS_VM_READ", pid);
            let handle = unsafe { OpenProcess(PROCESS_VM_READ | PROCESS_QUERY_INFORMATION, false, pid) }
                .map_err(|e| {
                    error!("OpenProcess failed for PID={}: {}", pid, e);
                    io::Error::new(io::ErrorKind::PermissionDenied, e.to_string())
                })?;
            info!("Successfully opened process PID={}, handle={:?}", pid, handle);
            self.handle = Some(handle);
            Ok(())
        }

        fn read_memory(&self, address: usize, size: usize) -> io::Result<Vec<u8>> {
            let handle = self.handle()?;
            let mut buffer = vec![0u8; size];
            let mut bytes_read = 0usize;
            trace!("ReadProcessMemory addr=0x{:X} size={}", address, size);
            unsafe {
                ReadProcessMemory(
                    handle,
                    address as *const _,
                    buffer.as_mut_ptr() as *mut _,
                    size,
                    Some(&mut bytes_read),
                )
            }
            .map_err(|e| {
                debug!(
                    "ReadProcessMemory failed at 0x{:X} (size={}): {}",
                    address, size, e
                );
                io::Error::new(io::ErrorKind::Other, e.to_string())
            })?;
            buffer.truncate(bytes_read);
            Ok(buffer)
        }

        fn detach(&mut self) -> io::Result<()> {
            if let Some(handle) = self.handle.take() {
                info!("Closing process handle {:?}", handle);
                unsafe { CloseHandle(handle) }
                    .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
            }
            Ok(())
        }

        fn is_attached(&self) -> bool {
            self.handle.is_some()
        }

        fn main_module(&self) -> io::Result<ModuleInfo> {
            let handle = self.handle()?;
            // The first module handed back is always the executable itself.
            let mut module = HMODULE::default();
            let mut needed = 0u32;
            unsafe {
                EnumProcessModules(
                    handle,
                    &mut module,
                    std::mem::size_of::<HMODULE>() as u32,
                    &mut needed,
                )
            }
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

            let mut info = MODULEINFO::default();
            unsafe {
                GetModuleInformation(
                    handle,
                    module,
                    &mut info,
                    std::mem::size_of::<MODULEINFO>() as u32,
                )
            }
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

            Ok(ModuleInfo {
                base: info.lpBaseOfDll as usize,
                size: info.SizeOfImage as usize,
            })
        }

        fn is_alive(&self) -> bool {
            let Ok(handle) = self.handle() else {
                return false;
            };
            let mut code = 0u32;
            match unsafe { GetExitCodeProcess(handle, &mut code) } {
                Ok(()) => code == STILL_ACTIVE,
                Err(e) => {
                    debug!("GetExitCodeProcess failed: {}", e);
                    false
                }
            }
        }
    }

    impl Drop for WindowsMemoryReader {
        fn drop(&mut self) {
            let _ = self.detach();
        }
    }
}

#[cfg(target_os = "linux")]
mod linux_impl {
    use super::*;
    use std::fs::File;
    use std::io::{Read, Seek, SeekFrom};

    pub struct LinuxMemoryReader {
        pid: Option<u32>,
        mem_file: Option<File>,
    }

    impl LinuxMemoryReader {
        pub fn new() -> Self {
            Self {
                pid: None,
                mem_file: None,
            }
        }

        fn pid(&self) -> io::Result<u32> {
            self.pid
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "Not attached"))
        }
    }

    impl ProcessMemoryReader for LinuxMemoryReader {
        fn attach(&mut self, pid: u32) -> io::Result<()> {
            self.detach()?;
            let path = format!("/proc/{}/mem", pid);
            info!("Opening {} for memory reading", path);
            let file = File::open(&path).map_err(|e| {
                error!("Failed to open {}: {}", path, e);
                e
            })?;
            info!("Successfully opened {}", path);
            self.mem_file = Some(file);
            self.pid = Some(pid);
            Ok(())
        }

        fn read_memory(&self, address: usize, size: usize) -> io::Result<Vec<u8>> {
            let file = self
                .mem_file
                .as_ref()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "Not attached"))?;
            let mut file = file.try_clone()?;
            trace!("Reading /proc mem at 0x{:X} size={}", address, size);
            file.seek(SeekFrom::Start(address as u64))?;
            let mut buffer = vec![0u8; size];
            let bytes_read = file.read(&mut buffer)?;
            buffer.truncate(bytes_read);
            Ok(buffer)
        }

        fn detach(&mut self) -> io::Result<()> {
            if self.mem_file.take().is_some() {
                info!("Closed /proc/mem file");
            }
            self.pid = None;
            Ok(())
        }

        fn is_attached(&self) -> bool {
            self.mem_file.is_some()
        }

        fn main_module(&self) -> io::Result<ModuleInfo> {
            let pid = self.pid()?;
            let maps = std::fs::read_to_string(format!("/proc/{}/maps", pid))?;
            // Under Wine the executable is mapped by file name while /proc/<pid>/exe
            // points at the loader, so match on the (possibly truncated) comm name first.
            let comm = std::fs::read_to_string(format!("/proc/{}/comm", pid))
                .map(|s| s.trim().to_ascii_lowercase())
                .unwrap_or_default();
            let exe = std::fs::read_link(format!("/proc/{}/exe", pid))
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default();

            let by_comm = (!comm.is_empty())
                .then(|| {
                    module_span(&maps, |path| {
                        path.rsplit('/')
                            .next()
                            .map_or(false, |f| f.to_ascii_lowercase().starts_with(&comm))
                    })
                })
                .flatten();
            by_comm
                .or_else(|| module_span(&maps, |path| !exe.is_empty() && path == exe))
                .ok_or_else(|| {
                    io::Error::new(io::ErrorKind::NotFound, "main module not found in maps")
                })
        }

        fn is_alive(&self) -> bool {
            let Some(pid) = self.pid else {
                return false;
            };
            if unsafe { libc::kill(pid as libc::pid_t, 0) } == 0 {
                return true;
            }
            io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
        }
    }

    /// Lowest start to highest end over every `/proc/<pid>/maps` line whose path matches.
    pub(super) fn module_span(maps: &str, matches: impl Fn(&str) -> bool) -> Option<ModuleInfo> {
        let mut span: Option<(usize, usize)> = None;
        for line in maps.lines() {
            let mut fields = line.split_whitespace();
            let Some(range) = fields.next() else {
                continue;
            };
            let Some(path) = fields.nth(4) else {
                continue;
            };
            if !matches(path) {
                continue;
            }
            let Some((start, end)) = range.split_once('-') else {
                continue;
            };
            let (Ok(start), Ok(end)) = (
                usize::from_str_radix(start, 16),
                usize::from_str_radix(end, 16),
            ) else {
                continue;
            };
            span = Some(match span {
                Some((lo, hi)) => (lo.min(start), hi.max(end)),
                None => (start, end),
            });
        }
        span.map(|(lo, hi)| ModuleInfo {
            base: lo,
            size: hi - lo,
        })
    }
}

pub fn create_reader() -> Box<dyn ProcessMemoryReader> {
    #[cfg(windows)]
    {
        Box::new(windows_impl::WindowsMemoryReader::new())
    }
    #[cfg(target_os = "linux")]
    {
        Box::new(linux_impl::LinuxMemoryReader::new())
    }
}

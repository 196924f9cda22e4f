// SoloMiner - Free and Open Source Software Statement
//
// File: src/miner/kernel/opencl.rs
// Version: 1.3.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// OpenCL host driver for the SHA-256d search kernel. Compiles
// kernels/opencl/sha256d.cl for the first usable GPU device, then serves
// one dispatch per search call: write (header, target, results, base_nonce)
// buffers, run one thread per nonce, wait, read results.

use super::{KernelCounters, KernelError, SearchKernel, clamp_count};
use crate::core::difficulty::{U256, target_to_le_words};
use anyhow::{Error, Result};
use opencl3::{
    command_queue::CommandQueue,
    context::Context,
    device::{CL_DEVICE_TYPE_GPU, Device},
    kernel::{ExecuteKernel, Kernel},
    memory::{Buffer, CL_MEM_READ_ONLY, CL_MEM_WRITE_ONLY},
    platform::get_platforms,
    program::Program,
    types::{CL_FALSE, CL_TRUE, cl_uint},
};
use std::ptr;
use std::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Dispatch state for one device, serialized behind one lock: the OpenCL
/// handles are safe to move between threads but not to share, and the
/// engine runs one GPU dispatch thread by default anyway.
struct Dispatch {
    context: Context,
    _program: Program,
    kernel: Kernel,
    queue: CommandQueue,
}

pub struct OpenClKernel {
    device_name: String,
    dispatch: Mutex<Dispatch>,
    counters: KernelCounters,
}

impl OpenClKernel {
    /// Find the first GPU device across all platforms and build the
    /// SHA-256d program for it.
    pub fn create() -> Result<Self> {
        let platforms = get_platforms()
            .map_err(|e| Error::msg(format!("OpenCL platform detection failed: {}", e)))?;
        if platforms.is_empty() {
            return Err(Error::msg("No OpenCL platforms found"));
        }

        for platform in platforms {
            let platform_name = platform.name().unwrap_or_else(|_| "Unknown Platform".to_string());
            let device_ids = match platform.get_devices(CL_DEVICE_TYPE_GPU) {
                Ok(ids) => ids,
                Err(e) => {
                    debug!("No GPU devices on platform {}: {}", platform_name, e);
                    continue;
                }
            };
            for device_id in device_ids {
                let device = Device::new(device_id);
                let device_name = device.name().unwrap_or_else(|_| "Unknown Device".to_string());
                info!("Detected OpenCL device: {} (Platform: {})", device_name, platform_name);
                match Self::initialize(device, device_name.clone()) {
                    Ok(kernel) => return Ok(kernel),
                    Err(e) => {
                        warn!("Failed to initialize {}: {}", device_name, e);
                    }
                }
            }
        }

        Err(Error::msg("No usable OpenCL GPU device"))
    }

    fn initialize(device: Device, device_name: String) -> Result<Self> {
        let context = Context::from_device(&device)
            .map_err(|e| Error::msg(format!("Failed to create context: {}", e)))?;

        let kernel_source = include_str!("../../../kernels/opencl/sha256d.cl");
        let mut program = Program::create_from_source(&context, kernel_source)
            .map_err(|e| Error::msg(format!("Failed to create program: {}", e)))?;

        if let Err(e) = program.build(context.devices(), "") {
            error!("Failed to build OpenCL program: {}", e);
            for device_id in context.devices() {
                if let Ok(log) = program.get_build_log(*device_id) {
                    error!("Build log for device {:?}: {}", device_id, log);
                }
            }
            return Err(Error::msg(format!("Program build failed: {}", e)));
        }

        let kernel = Kernel::create(&program, "mine_sha256d")
            .map_err(|e| Error::msg(format!("Failed to create kernel: {}", e)))?;
        let queue = CommandQueue::create_default(&context, 0)
            .map_err(|e| Error::msg(format!("Failed to create command queue: {}", e)))?;

        info!("✅ OpenCL engine initialized for {}", device_name);

        Ok(Self {
            device_name,
            dispatch: Mutex::new(Dispatch { context, _program: program, kernel, queue }),
            counters: KernelCounters::default(),
        })
    }

    /// One GPU dispatch over `count` nonces. Returns the raw results words.
    fn dispatch_range(
        &self,
        header_words: &[cl_uint; 20],
        target_words: &[cl_uint; 8],
        base_nonce: u32,
        count: u32,
    ) -> Result<[cl_uint; 4]> {
        let dispatch = self.dispatch.lock().unwrap_or_else(|e| e.into_inner());
        let context = &dispatch.context;
        let queue = &dispatch.queue;

        let mut header_buf = unsafe {
            Buffer::<cl_uint>::create(context, CL_MEM_READ_ONLY, 20, ptr::null_mut())
                .map_err(|e| Error::msg(format!("Failed to create header buffer: {}", e)))?
        };
        let mut target_buf = unsafe {
            Buffer::<cl_uint>::create(context, CL_MEM_READ_ONLY, 8, ptr::null_mut())
                .map_err(|e| Error::msg(format!("Failed to create target buffer: {}", e)))?
        };
        let mut results_buf = unsafe {
            Buffer::<cl_uint>::create(context, CL_MEM_WRITE_ONLY, 4, ptr::null_mut())
                .map_err(|e| Error::msg(format!("Failed to create results buffer: {}", e)))?
        };
        let mut nonce_buf = unsafe {
            Buffer::<cl_uint>::create(context, CL_MEM_READ_ONLY, 1, ptr::null_mut())
                .map_err(|e| Error::msg(format!("Failed to create nonce buffer: {}", e)))?
        };

        // Winner slot starts at u32::MAX so atomic_min yields the smallest
        // winning nonce; the found flag disambiguates a real 0xFFFFFFFF win
        let initial_results: [cl_uint; 4] = [0, u32::MAX, 0, 0];
        let base = [base_nonce];

        unsafe {
            queue
                .enqueue_write_buffer(&mut header_buf, CL_FALSE, 0, header_words, &[])
                .map_err(|e| Error::msg(format!("Failed to write header buffer: {}", e)))?;
            queue
                .enqueue_write_buffer(&mut target_buf, CL_FALSE, 0, target_words, &[])
                .map_err(|e| Error::msg(format!("Failed to write target buffer: {}", e)))?;
            queue
                .enqueue_write_buffer(&mut results_buf, CL_FALSE, 0, &initial_results, &[])
                .map_err(|e| Error::msg(format!("Failed to write results buffer: {}", e)))?;
            queue
                .enqueue_write_buffer(&mut nonce_buf, CL_FALSE, 0, &base, &[])
                .map_err(|e| Error::msg(format!("Failed to write nonce buffer: {}", e)))?;
        }

        unsafe {
            ExecuteKernel::new(&dispatch.kernel)
                .set_arg(&header_buf)
                .set_arg(&target_buf)
                .set_arg(&results_buf)
                .set_arg(&nonce_buf)
                .set_global_work_size(count as usize)
                .enqueue_nd_range(queue)
                .map_err(|e| Error::msg(format!("Failed to execute kernel: {}", e)))?;
        }

        queue
            .finish()
            .map_err(|e| Error::msg(format!("Failed to finish queue: {}", e)))?;

        let mut results: [cl_uint; 4] = [0; 4];
        unsafe {
            queue
                .enqueue_read_buffer(&results_buf, CL_TRUE, 0, &mut results, &[])
                .map_err(|e| Error::msg(format!("Failed to read results buffer: {}", e)))?;
        }

        Ok(results)
    }
}

impl SearchKernel for OpenClKernel {
    fn search(
        &self,
        header: &[u8; 80],
        target: &U256,
        base_nonce: u32,
        count: u32,
    ) -> Result<Option<u32>, KernelError> {
        let count = clamp_count(base_nonce, count);
        if count == 0 {
            return Ok(None);
        }

        // Header as 20 big-endian words: the kernel rebuilds the wire bytes
        // word-by-word, replacing word 19 with each thread's nonce
        let mut header_words = [0u32; 20];
        for (i, word) in header_words.iter_mut().enumerate() {
            let o = i * 4;
            *word = u32::from_be_bytes([header[o], header[o + 1], header[o + 2], header[o + 3]]);
        }
        let target_words = target_to_le_words(target);

        let results = self
            .dispatch_range(&header_words, &target_words, base_nonce, count)
            .map_err(|e| KernelError::DispatchFailed(e.to_string()))?;

        self.counters.add_hashes(count as u64);
        self.counters.update_best_bits(results[2]);
        // results[3] (best nonce) is written by the kernel but unused here

        if results[0] != 0 {
            debug!(
                "🎉 GPU dispatch found winner: nonce word {:#010x} (base {:#010x})",
                results[1], base_nonce
            );
            Ok(Some(results[1]))
        } else {
            Ok(None)
        }
    }

    fn take_hashes_tried(&self) -> u64 {
        self.counters.take_hashes()
    }

    fn best_share_bits(&self) -> u32 {
        self.counters.best_bits()
    }

    fn is_gpu(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        format!("OpenCL SHA-256d on {}", self.device_name)
    }
}


// Changelog:
// - v1.3.0 (2025-07-28): Winner slot taken with atomic_min so the smallest
//   winning nonce in a dispatch is reported deterministically.
// - v1.0.0 (2025-06-30): Initial OpenCL host driver.

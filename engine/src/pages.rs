//! Sentinel buffers handed out as pointer arguments: an all-zero page, an
//! all-`0xff` page, a page of running random noise, and a set of
//! independently-allocated heap pages for "valid but arbitrary" addresses.
//!
//! These are allocated once, before the supervisor forks its first child,
//! and inherited from there on. A child that needs fresh noise in
//! `page_rand` regenerates its own copy in place; it never reallocates, so
//! the addresses a syscall table captured as "this pointer" stay valid for
//! the life of the worker.

use crate::random::Rng;

/// One independently-allocated page, to use as a pointer that is valid but
/// has nothing the kernel expects living behind it.
const ALLOC_POOL_LEN: usize = 64;

pub struct Pages {
    page_size: usize,
    zeros: *mut u8,
    ones: *mut u8,
    rand: *mut u8,
    allocs: Vec<*mut u8>,
}

// Every method here only ever copies pointer values out of `&self` or
// writes through the pointee; it never mutates the struct's own fields, so
// sharing `&Pages` across a fork boundary and among synthesis calls is
// sound even though the pointee itself is written to repeatedly.
unsafe impl Send for Pages {}
unsafe impl Sync for Pages {}

fn page_layout(page_size: usize) -> std::alloc::Layout {
    std::alloc::Layout::from_size_align(page_size, page_size).expect("page size is a valid alignment")
}

fn alloc_page(page_size: usize, fill: u8) -> std::io::Result<*mut u8> {
    let p = unsafe { std::alloc::alloc(page_layout(page_size)) };
    if p.is_null() {
        return Err(std::io::Error::new(std::io::ErrorKind::OutOfMemory, "page allocation failed"));
    }
    unsafe { std::ptr::write_bytes(p, fill, page_size) };
    Ok(p)
}

impl Pages {
    pub fn new(rng: &mut Rng) -> std::io::Result<Self> {
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) }.max(4096) as usize;
        let zeros = alloc_page(page_size, 0x00)?;
        let ones = alloc_page(page_size, 0xff)?;
        let rand = alloc_page(page_size, 0x00)?;

        let mut allocs = Vec::with_capacity(ALLOC_POOL_LEN);
        for _ in 0..ALLOC_POOL_LEN {
            allocs.push(alloc_page(page_size, 0x00)?);
        }

        let pages = Self { page_size, zeros, ones, rand, allocs };
        pages.regenerate_random_page(rng);
        Ok(pages)
    }

    /// Refill `page_rand` with fresh noise. Takes `&self`, not `&mut self`:
    /// the buffer being rewritten is heap memory reached through a raw
    /// pointer, not part of the borrow-checked struct, so any owner of a
    /// shared reference may call this.
    pub fn regenerate_random_page(&self, rng: &mut Rng) {
        let buf = unsafe { std::slice::from_raw_parts_mut(self.rand, self.page_size) };
        for chunk in buf.chunks_mut(8) {
            let v = rng.biased_u64().to_ne_bytes();
            chunk.copy_from_slice(&v[..chunk.len()]);
        }
    }

    pub fn zeros_addr(&self) -> u64 {
        self.zeros as u64
    }

    pub fn ones_addr(&self) -> u64 {
        self.ones as u64
    }

    pub fn rand_addr(&self) -> u64 {
        self.rand as u64
    }

    pub fn random_alloc_addr(&self, rng: &mut Rng) -> u64 {
        let idx = rng.range_usize(0, self.allocs.len() - 1);
        self.allocs[idx] as u64
    }
}

impl Drop for Pages {
    fn drop(&mut self) {
        let layout = page_layout(self.page_size);
        unsafe {
            std::alloc::dealloc(self.zeros, layout);
            std::alloc::dealloc(self.ones, layout);
            std::alloc::dealloc(self.rand, layout);
            for p in &self.allocs {
                std::alloc::dealloc(*p, layout);
            }
        }
    }
}

/// Choose among NULL, the three sentinel pages, a random heap allocation,
/// or an address in the conventional Linux kernel range.
pub fn biased_pointer(rng: &mut Rng, pages: &Pages) -> u64 {
    match rng.range_u64(0, 5) {
        0 => 0,
        1 => pages.zeros_addr(),
        2 => pages.ones_addr(),
        3 => pages.rand_addr(),
        4 => pages.random_alloc_addr(rng),
        _ => {
            const KERNEL_BASE: u64 = 0xffff_8000_0000_0000;
            KERNEL_BASE | (rng.biased_u64() & 0x0000_7fff_ffff_ffff)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_pages_hold_their_fill() {
        let mut rng = Rng::new(7);
        let pages = Pages::new(&mut rng).unwrap();
        unsafe {
            assert_eq!(*(pages.zeros_addr() as *const u8), 0x00);
            assert_eq!(*(pages.ones_addr() as *const u8), 0xff);
        }
    }

    #[test]
    fn biased_pointer_is_deterministic_for_a_seed() {
        let mut rng_a = Rng::new(99);
        let pages_a = Pages::new(&mut rng_a).unwrap();
        let mut rng_b = Rng::new(99);
        let pages_b = Pages::new(&mut rng_b).unwrap();
        for _ in 0..16 {
            // Compares shapes, not raw addresses: two independent heap
            // allocations never land at the same address.
            let a = biased_pointer(&mut rng_a, &pages_a);
            let b = biased_pointer(&mut rng_b, &pages_b);
            assert_eq!(a == 0, b == 0);
        }
    }
}

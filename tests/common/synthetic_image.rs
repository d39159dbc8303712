use pixels_engine::PixelBuffer;

/// Gray checkerboard alternating `dark` and `light` cells, dark at the origin.
pub fn checkerboard(width: usize, height: usize, cell: usize, dark: u8, light: u8) -> PixelBuffer {
    assert!(width > 0 && height > 0, "image dimensions must be positive");
    assert!(cell > 0, "cell size must be positive");

    let pixels = (0..height).flat_map(move |y| {
        (0..width).map(move |x| {
            let v = if ((x / cell) + (y / cell)) % 2 == 0 { dark } else { light };
            (v, v, v)
        })
    });
    PixelBuffer::from_pixels(width, height, pixels, 255).expect("valid checkerboard")
}

/// Whether `(x, y)` falls on a light cell of [`checkerboard`]
pub fn is_light_cell(x: usize, y: usize, cell: usize) -> bool {
    ((x / cell) + (y / cell)) % 2 == 1
}

/// Smooth color ramp touching every byte value
pub fn color_ramp(width: usize, height: usize) -> PixelBuffer {
    let pixels = (0..height).flat_map(move |y| {
        (0..width).map(move |x| {
            let r = (x * 255 / (width - 1).max(1)) as u8;
            let g = (y * 255 / (height - 1).max(1)) as u8;
            let b = ((x + y) % 256) as u8;
            (r, g, b)
        })
    });
    PixelBuffer::from_pixels(width, height, pixels, 255).expect("valid ramp")
}

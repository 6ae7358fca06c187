use super::*;
use pretty_assertions::assert_eq;

/// Red square on white with a red pixel in the far corner that is not connected.
fn red_square() -> Image {
    Image::from_fn(8, 8, |x, y| {
        if (2..5).contains(&x) && (2..5).contains(&y) || (x == 7 && y == 7) {
            [220, 20, 20, 255]
        } else {
            WHITE
        }
    })
    .unwrap()
}

#[test]
fn test_selects_connected_region() {
    let mask = Filter::MagicWandSelect { seed_x: 3, seed_y: 3, threshold: 0 }.select(&red_square()).unwrap();
    assert_eq!(mask.count(), 9);
    assert!(mask.get(2, 2));
    assert!(!mask.get(7, 7));
}

#[test]
fn test_background_selection_wraps_around_square() {
    let mask = Filter::MagicWandSelect { seed_x: 0, seed_y: 0, threshold: 10 }.select(&red_square()).unwrap();
    assert_eq!(mask.count(), 64 - 10);
}

#[test]
fn test_selection_drives_follow_up_filter() {
    let image = red_square();
    let mask = Filter::MagicWandSelect { seed_x: 2, seed_y: 4, threshold: 0 }.select(&image).unwrap();
    let out = Filter::Invert.apply(&image, Some(&mask)).unwrap();
    assert_eq!(out.pixel(3, 3), [35, 235, 235, 255]);
    assert_eq!(out.pixel(7, 7), [220, 20, 20, 255]);
    assert_eq!(out.pixel(0, 0), WHITE);
}

#[test]
fn test_wand_is_not_an_image_filter() {
    let image = red_square();
    let wand = Filter::MagicWandSelect { seed_x: 0, seed_y: 0, threshold: 0 };
    assert!(matches!(wand.apply(&image, None), Err(FilterError::InvalidFilterParameters(_))));
    assert!(Filter::Invert.select(&image).is_err());
}

#[test]
fn test_seed_outside_image() {
    let wand = Filter::MagicWandSelect { seed_x: 8, seed_y: 0, threshold: 0 };
    assert!(matches!(wand.select(&red_square()), Err(FilterError::InvalidFilterParameters(_))));
}

#[test]
fn test_large_region_does_not_overflow_stack() {
    let image = Image::filled(512, 512, WHITE).unwrap();
    let mask = Filter::MagicWandSelect { seed_x: 100, seed_y: 400, threshold: 0 }.select(&image).unwrap();
    assert_eq!(mask.count(), 512 * 512);
}
